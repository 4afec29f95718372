//! A bridge with a dimmable lamp and a stateless button, driven by a scripted
//! controller conversation. Run with `RUST_LOG=debug` to see the traffic.

use std::collections::VecDeque;

use hap_accessory::{
    catalog::{
        characteristics as chr, light_bulb, programmable_switch,
        utility::accessory_information::AccessoryInformation,
    },
    config::{AccessoryConfig, Category},
    data_model::{
        handler::{on_update, ButtonPress, PressType},
        Database,
    },
    end_device::EndDevice,
    storage::MemoryStorage,
    transport::{Incoming, Outgoing, Request, ScriptedTransport},
    util::time::SystemClock,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AccessoryConfig {
        display_name: "Demo Bridge".into(),
        category: Category::Bridge,
        device_id: "0E:2A:4C:11:52:07".into(),
        ..Default::default()
    }
    .with_bridge(true);

    let mut db = Database::new(config);
    {
        let mut bridge = db.add_accessory();
        AccessoryInformation::new("Demo Bridge").declare(&mut bridge);
    }
    let (on, brightness) = {
        let mut lamp = db.add_accessory();
        AccessoryInformation {
            model: "Dimmer",
            ..AccessoryInformation::new("Desk Lamp")
        }
        .declare(&mut lamp);
        let mut bulb = lamp.add_service(
            &light_bulb::SERVICE,
            on_update(|ctx| {
                if ctx.is_updated(&chr::BRIGHTNESS) {
                    log::info!(
                        "lamp dims to {}%",
                        ctx.get_new::<i32>(&chr::BRIGHTNESS).unwrap_or_default()
                    );
                }
                true
            }),
        );
        bulb.primary();
        let on = bulb.add_characteristic(&chr::ON, false).persist().id();
        let brightness = bulb
            .add_characteristic(&chr::BRIGHTNESS, 40)
            .range(5, 100, 5)
            .persist()
            .id();
        (on, brightness)
    };
    {
        let mut button = db.add_accessory();
        AccessoryInformation::new("Hall Button").declare(&mut button);
        button
            .add_service(&programmable_switch::SERVICE, programmable_switch::ProgrammableSwitch)
            .add_button(17)
            .add_default(&chr::PROGRAMMABLE_SWITCH_EVENT);
    }

    let mut device = EndDevice::new(db, MemoryStorage::new(), SystemClock::new());
    let status = device.begin()?;
    print!("{}", device.database().log().text());
    if !status.valid {
        return Err(format!("{} configuration errors", status.fatal_errors).into());
    }
    let advertisement = device.advertisement(false);
    log::info!("TXT {}", advertisement.txt_records().join(" "));
    #[cfg(feature = "mdns")]
    let _service = hap_accessory::transport::mdns::publish(&advertisement)?;

    let mut transport = ScriptedTransport::new();
    transport.push(0, Incoming::Opened);
    transport.push(1, Incoming::Opened);
    transport.push(0, Incoming::Request(Request::get("/accessories")));
    transport.push(
        1,
        Incoming::Request(Request::put(
            "/characteristics",
            format!(
                r#"{{"characteristics":[{{"aid":{},"iid":{},"ev":true}},{{"aid":3,"iid":9,"ev":true}}]}}"#,
                on.aid, on.iid
            ),
        )),
    );
    transport.push(
        0,
        Incoming::Request(Request::put(
            "/characteristics",
            format!(
                r#"{{"characteristics":[{{"aid":{},"iid":{},"value":1}},{{"aid":{},"iid":{},"value":85}}]}}"#,
                on.aid, on.iid, brightness.aid, brightness.iid
            ),
        )),
    );
    transport.push(
        1,
        Incoming::Request(Request::get(format!(
            "/characteristics?id={on},{brightness}&meta=1&ev=1"
        ))),
    );
    transport.push(0, Incoming::Closed);

    let mut buttons: VecDeque<ButtonPress> = VecDeque::new();
    for cycle in 0..6 {
        if cycle == 4 {
            buttons.push_back(ButtonPress {
                pin: 17,
                press: PressType::Double,
            });
        }
        device.poll(&mut transport, &mut buttons);
    }

    for (session, message) in transport.sent.drain(..) {
        match message {
            Outgoing::Response { status, body } => println!(
                "session {session} <- HTTP {status} {}",
                String::from_utf8_lossy(&body)
            ),
            Outgoing::Event { body } => {
                println!("session {session} <- EVENT {}", String::from_utf8_lossy(&body))
            }
        }
    }
    Ok(())
}
