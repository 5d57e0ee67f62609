use thermal_usb::{Config, Printer, UsbConfig, UsbTransport};
//
// cargo run --example read_status
//
// Lists matching printers, then sends an empty feed with reply reads
// enabled and dumps whatever the printer answers.
//

fn main() {
    env_logger::init();

    let usb = UsbConfig::new();
    match UsbTransport::list(&usb) {
        Ok(devices) => {
            for device in devices {
                println!(
                    "found {:04x}:{:04x} on bus {} address {}",
                    device.vendor_id, device.product_id, device.bus, device.address
                );
            }
        }
        Err(err) => panic!("could not enumerate devices: {}", err),
    }

    let transport = match UsbTransport::open(usb) {
        Ok(transport) => transport,
        Err(err) => panic!("could not open printer: {}", err),
    };

    let config = Config::new().read_reply(true);
    match Printer::new(transport, config) {
        Ok(mut printer) => match printer.send_feed(0) {
            Ok(Some(reply)) => println!("{:?}", reply),
            Ok(None) => println!("no reply"),
            Err(err) => println!("Error {:?}", err),
        },
        Err(err) => panic!("Invalid configuration settings: {}", err),
    }
}
