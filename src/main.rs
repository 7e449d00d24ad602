#[tokio::main]
async fn main() {
    if let Err(err) = monster_timer_lib::run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
