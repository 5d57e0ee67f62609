use std::env;
use thermal_usb::{Config, InkThreshold, Printer, UsbConfig, UsbTransport};

//
// cargo run --example print_image -- receipt.png [legacy]
//
// The image must be exactly 576 pixels wide. Set SERIAL in the environment
// or a .env file to pick one printer when several are attached.
//

fn print_usage() {
    println!("Usage: cargo run --example print_image -- <PNG> [alpha|legacy]");
    println!("  alpha   luminance <= 100 on opaque pixels is inked (default)");
    println!("  legacy  luminance <= 128 is inked, alpha ignored");
}

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{}:{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let threshold = match args.get(2).map(|s| s.as_str()) {
        None | Some("alpha") => InkThreshold::alpha_aware(),
        Some("legacy") => InkThreshold::legacy(),
        Some(other) => {
            eprintln!("Error: Unknown threshold '{}'", other);
            print_usage();
            return;
        }
    };

    let image = match image::open(&args[1]) {
        Ok(image) => image.to_rgba8(),
        Err(err) => {
            eprintln!("Error: can't load {}: {}", args[1], err);
            return;
        }
    };

    let usb = match env::var("SERIAL") {
        Ok(serial) => UsbConfig::new().serial(serial),
        Err(_) => UsbConfig::new(),
    };
    let transport = match UsbTransport::open(usb) {
        Ok(transport) => transport,
        Err(err) => panic!("Can't open printer: {}", err),
    };

    let config = Config::new().threshold(threshold).feed_dots(300);
    let mut printer = Printer::new(transport, config).unwrap();
    match printer.print_image(&image) {
        Ok(()) => println!("printed {}", args[1]),
        Err(err) if err.is_transport() => println!("transport failed, re-run the job: {}", err),
        Err(err) => println!("ERROR {:#?}", err),
    }

    if let Err(err) = printer.into_inner().close() {
        println!("close failed {:?}", err);
    }
}
