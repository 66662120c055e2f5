use chrono::NaiveDate;
use climate_geomet::{ClimateClient, ClimateConfig, ClimateError, Interval, StationSelector};
use std::env;

#[tokio::main]
async fn main() -> Result<(), ClimateError> {
    configure_polars_display();
    let client = ClimateClient::with_config(ClimateConfig::with_system_cache_dir())?;

    let batch = client
        .download_observations()
        .selector(StationSelector::ClimateIds(vec!["1108395".to_string()]))
        .start(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
        .end(NaiveDate::from_ymd_opt(2023, 1, 31).unwrap())
        .interval(Interval::Daily)
        .verbose(true)
        .call()
        .await?;

    for failure in &batch.failures {
        eprintln!("{:?} failed: {}", failure.climate_id, failure.error);
    }
    println!("{}", batch.to_dataframe()?);

    let normals = client
        .download_normals()
        .climate_id("1108395")
        .period("1981-2010")
        .call()
        .await?;
    match &normals.warning {
        Some(warning) => println!("No normals: {warning}"),
        None => println!("{}", normals.to_dataframe()?.head(Some(12))),
    }
    Ok(())
}

fn configure_polars_display() {
    // show every column
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    env::set_var("POLARS_FMT_MAX_ROWS", "20");
}
