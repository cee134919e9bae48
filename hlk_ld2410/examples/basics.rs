use std::thread::sleep;
use std::time::Duration;

use hlk_ld2410::Ld2410;

/// Simple demonstration that prints the detected targets every half second.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Opening serial device");
    let mut radar = Ld2410::open("/dev/ttyUSB0", 256_000)?;
    println!("Waiting for the radar");
    radar.connect()?;
    if let Some(version) = radar.firmware() {
        println!("Firmware {version}");
    }
    let config = radar.request_configuration()?;
    println!("max gate={}, idle={}s", config.max_gate, config.idle_time_s);
    println!("Start sensor loop");
    loop {
        while radar.poll()? {}
        let reading = radar.reading();
        println!(
            "presence={}, moving={:?}, stationary={:?}",
            reading.presence(),
            reading.moving_target(),
            reading.stationary_target()
        );
        sleep(Duration::from_millis(500));
    }
}
