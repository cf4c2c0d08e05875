use std::env;
use urbanobs::{UrbanObsError, UrbanObservatory};

#[tokio::main]
async fn main() -> Result<(), UrbanObsError> {
    env_logger::init();
    configure_polars_display();

    let variable = env::args().nth(1).unwrap_or_else(|| "PM2.5".to_string());
    let client = UrbanObservatory::new().await?;

    for days in [1, 7] {
        let view = client
            .readings()
            .variable(&variable)
            .days(days)
            .call()
            .await?;
        let dataset = client.dataset(&variable, days).await?;
        println!(
            "{} over {} days ({} from {}), resampled to {:?}:",
            dataset,
            days,
            dataset.units(),
            dataset.origin(),
            view.target_frequency()
        );
        println!("{}", view.frame());
    }

    let peaks = client.dataset(&variable, 1).await?.peak_by_location()?;
    println!("Peak {} per sensor location:\n{}", variable, peaks);

    if let Some(mean) = client.latest_mean(&variable).await? {
        println!("Mean {} over the last day: {:.2}", variable, mean);
    }

    Ok(())
}

fn configure_polars_display() {
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    env::set_var("POLARS_FMT_MAX_ROWS", "20");
}
