use csv::ReaderBuilder;
use ndarray::Array3;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::error::Error;

#[derive(Debug, Deserialize)]
struct MeasurementRecord {
    unit: usize,
    slot: usize,
    day: usize,
    value: f64,
}

/// Reads long-format measurement rows `(unit, slot, day, value)` into a
/// dense tensor. Cells without a record stay zero, the missingness marker.
pub fn load_measurement_tensor(file_path: &str) -> Result<Array3<f64>, Box<dyn Error>> {
    let mut rdr = ReaderBuilder::new().from_path(file_path)?;

    let mut records: Vec<MeasurementRecord> = Vec::new();
    let (mut units, mut slots, mut days) = (0usize, 0usize, 0usize);
    for result in rdr.deserialize() {
        let record: MeasurementRecord = result?;
        units = units.max(record.unit + 1);
        slots = slots.max(record.slot + 1);
        days = days.max(record.day + 1);
        records.push(record);
    }

    println!("Found {} measurement records", records.len());
    println!("Tensor shape: {} units x {} slots x {} days", units, slots, days);

    let mut tensor = Array3::zeros((units, slots, days));
    for record in records {
        tensor[[record.unit, record.slot, record.day]] = record.value;
    }

    Ok(tensor)
}

#[derive(Debug, Deserialize)]
struct PartitionRecord {
    unit: usize,
    granularity: usize,
    label: usize,
}

/// Reads the externally computed partition table: rows `(unit, granularity,
/// label)`, one label per unit at each granularity. Returns
/// `labels[granularity][unit]`.
pub fn load_partition_labels(
    file_path: &str,
    units: usize,
) -> Result<FxHashMap<usize, Vec<usize>>, Box<dyn Error>> {
    let mut rdr = ReaderBuilder::new().from_path(file_path)?;

    let mut labels: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for result in rdr.deserialize() {
        let record: PartitionRecord = result?;
        if record.unit >= units {
            return Err(format!("partition label for unknown unit {}", record.unit).into());
        }
        labels
            .entry(record.granularity)
            .or_insert_with(|| vec![0; units])[record.unit] = record.label;
    }

    println!("Found partition labels at {} granularities", labels.len());
    Ok(labels)
}
