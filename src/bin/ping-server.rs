use std::process;

use env_logger::Env;
use log::error;
use pingpong::ping;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(err) = ping::run_server(ping::SERVER_ADDR) {
        error!("{err}");
        process::exit(1);
    }
}
