use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use geo::Point;
use serde::Deserialize;
use sg_overlap::{Direction, StationRecord, StopCode, StopRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One row of the bus route table
#[derive(Debug, Deserialize)]
struct BusRouteRow {
    #[serde(rename = "ServiceNo")]
    service_no: String,
    #[serde(rename = "Direction")]
    direction: u8,
    #[serde(rename = "StopSequence")]
    stop_sequence: u32,
    #[serde(rename = "BusStopCode", default)]
    bus_stop_code: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "Category", default)]
    category: Option<String>,
}

/// One row of the MRT station table
#[derive(Debug, Deserialize)]
struct StationRow {
    #[serde(rename = "STN_NO")]
    stn_no: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "STN_NAME", default)]
    stn_name: Option<String>,
}

impl BusRouteRow {
    fn into_record(self) -> Result<StopRecord> {
        let direction = Direction::from_code(self.direction)
            .ok_or_else(|| anyhow!("unknown direction {} for service {}", self.direction, self.service_no))?;

        let mut record = StopRecord::new(
            self.service_no,
            direction,
            self.stop_sequence,
            Point::new(self.longitude, self.latitude),
        );
        record.stop_code = self.bus_stop_code.map(StopCode::from);
        record.description = self.description.map(Into::into);
        record.category = self.category.map(Into::into);

        Ok(record)
    }
}

impl StationRow {
    fn into_record(self) -> Result<StationRecord> {
        let mut record = StationRecord::from_code(&self.stn_no, Point::new(self.longitude, self.latitude))?;
        record.name = self.stn_name.map(Into::into);
        Ok(record)
    }
}

/// Parse bus route rows from any reader
pub fn parse_bus_routes<R: Read>(reader: R) -> Result<Vec<StopRecord>> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut records = Vec::new();
    for (i, row) in rdr.deserialize::<BusRouteRow>().enumerate() {
        // Header is line 1
        let line = i + 2;
        let row = row.with_context(|| format!("Malformed bus route row at line {}", line))?;
        records.push(row.into_record().with_context(|| format!("Invalid bus route row at line {}", line))?);
    }

    Ok(records)
}

/// Parse MRT station rows from any reader
pub fn parse_stations<R: Read>(reader: R) -> Result<Vec<StationRecord>> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut records = Vec::new();
    for (i, row) in rdr.deserialize::<StationRow>().enumerate() {
        let line = i + 2;
        let row = row.with_context(|| format!("Malformed station row at line {}", line))?;
        records.push(row.into_record().with_context(|| format!("Invalid station row at line {}", line))?);
    }

    Ok(records)
}

pub fn read_bus_routes(path: &Path) -> Result<Vec<StopRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let records = parse_bus_routes(file).with_context(|| format!("Failed to read {}", path.display()))?;
    log::info!("Loaded {} bus stop records from {}", records.len(), path.display());
    Ok(records)
}

pub fn read_stations(path: &Path) -> Result<Vec<StationRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let records = parse_stations(file).with_context(|| format!("Failed to read {}", path.display()))?;
    log::info!("Loaded {} station records from {}", records.len(), path.display());
    Ok(records)
}
