use climate_geomet::{ClimateClient, ClimateConfig, ClimateError, Interval, LatLon, SearchCriteria};

#[tokio::main]
async fn main() -> Result<(), ClimateError> {
    let client = ClimateClient::with_config(ClimateConfig::with_system_cache_dir())?;

    // Stations within 25 km of downtown Vancouver that report daily data.
    let criteria = SearchCriteria::builder()
        .coords(LatLon(49.2827, -123.1207))
        .dist_km(25.0)
        .interval(Interval::Daily)
        .build();
    let hits = client.search_stations(&criteria).await?;

    println!("Found {} stations:", hits.len());
    for hit in &hits {
        println!(
            "{:>8} {:<10} {:<40} {:>6.1} km",
            hit.station.station_id,
            hit.station.climate_id.as_deref().unwrap_or("-"),
            hit.station.station_name,
            hit.distance_km.unwrap_or_default()
        );
    }
    Ok(())
}
