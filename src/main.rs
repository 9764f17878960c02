#[actix_web::main]
async fn main() {
    if let Err(err) = salescoach_lib::app::run().await {
        eprintln!("salescoach failed to start: {err}");
        std::process::exit(1);
    }
}
