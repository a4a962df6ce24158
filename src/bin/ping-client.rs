use std::io;

use env_logger::Env;
use pingpong::ping;

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    ping::run_client(ping::CLIENT_URL, &mut io::stdout().lock())
}
