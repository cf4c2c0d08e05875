use criterion::{black_box, criterion_group, criterion_main, Criterion};
use urbanobs::{parse_readings, DataOrigin, Dataset, FetchRequest, SensorFrameCleanExt};

/// Four weeks of 15 minute readings with a handful of spikes and flagged rows.
fn synthetic_month() -> String {
    let mut body = String::from(
        "Sensor Name,Variable,Units,Timestamp,Value,Flagged as Suspect Reading,Sensor Centroid Longitude,Sensor Centroid Latitude\n",
    );
    let start = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid start");
    for i in 0..(28 * 96) {
        let ts = start + chrono::Duration::minutes(15 * i);
        let value = if i % 500 == 0 { 400.0 } else { 10.0 + (i % 37) as f64 * 0.5 };
        let flag = if i % 211 == 0 { "True" } else { "False" };
        body.push_str(&format!(
            "PER_AIRMON_MONITOR1135100,PM2.5,ugm -3,{},{value},{flag},-1.6178,54.9783\n",
            ts.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    body
}

fn bench_pipeline(c: &mut Criterion) {
    let raw = parse_readings(synthetic_month().as_bytes()).expect("parse fixture");
    let request = FetchRequest::new("PM2.5", 28).expect("valid request");
    let dataset = Dataset::new(request, raw.clone(), DataOrigin::Snapshot);

    c.bench_function("remove_suspect_then_outliers", |b| {
        b.iter(|| {
            black_box(&raw)
                .remove_suspect()
                .and_then(|df| df.remove_outliers())
                .expect("clean")
        })
    });
    c.bench_function("clean_and_downsample_28_days", |b| {
        b.iter(|| {
            let mut view = dataset.view();
            view.remove_suspect().expect("suspect");
            view.remove_outliers().expect("outliers");
            view.downsample().expect("downsample");
            black_box(view.into_frame())
        })
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
