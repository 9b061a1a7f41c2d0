use deck::{
    configuration,
    startup::Application,
    telemetry::{get_subscriber, init_subscriber, DEFAULT_FILTER},
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber(DEFAULT_FILTER, std::io::stdout);
    init_subscriber(subscriber);

    let settings = configuration::get_configuration().expect("config fetched");

    let application = Application::build(settings).await?;
    application.run_until_stopped().await?;
    Ok(())
}
