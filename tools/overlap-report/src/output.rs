use anyhow::{Context, Result};
use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde::Serialize;
use sg_overlap::{AlternativeOverlap, LineCorridor, OverlapResult, ProximitySummary};
use std::path::Path;

fn position(c: &Coord) -> Vec<f64> {
    vec![c.x, c.y]
}

fn ring_to_positions(ring: &LineString) -> Vec<Vec<f64>> {
    ring.0.iter().map(position).collect()
}

fn polygon_rings(poly: &Polygon) -> Vec<Vec<Vec<f64>>> {
    let mut rings = vec![ring_to_positions(poly.exterior())];
    for interior in poly.interiors() {
        rings.push(ring_to_positions(interior));
    }
    rings
}

fn polygon_to_geojson(poly: &Polygon) -> Value {
    Value::Polygon(polygon_rings(poly))
}

fn multipolygon_to_geojson(mp: &MultiPolygon) -> Value {
    Value::MultiPolygon(mp.0.iter().map(polygon_rings).collect())
}

fn linestring_to_geojson(line: &LineString) -> Value {
    Value::LineString(ring_to_positions(line))
}

fn point_to_geojson(point: &Point) -> Value {
    Value::Point(position(&point.0))
}

fn feature(value: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Rendering layers, all in longitude / latitude
#[derive(Default)]
pub struct LayerBuilder {
    features: Vec<Feature>,
}

impl LayerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Corridor outline and the line path it was built from
    pub fn add_corridor(&mut self, corridor: &LineCorridor) {
        let mut properties = JsonObject::new();
        properties.insert("feature_type".to_string(), serde_json::json!("corridor"));
        properties.insert("line".to_string(), serde_json::json!(corridor.line.as_str()));
        properties.insert("radius_m".to_string(), serde_json::json!(corridor.corridor.radius_m));
        properties.insert("area_m2".to_string(), serde_json::json!(corridor.corridor.area_m2()));
        self.features.push(feature(multipolygon_to_geojson(&corridor.geographic), properties));

        let mut properties = JsonObject::new();
        properties.insert("feature_type".to_string(), serde_json::json!("rail_line"));
        properties.insert("line".to_string(), serde_json::json!(corridor.line.as_str()));
        properties.insert("length_m".to_string(), serde_json::json!(corridor.path.length_m()));
        self.features.push(feature(linestring_to_geojson(&corridor.path.geographic), properties));
    }

    /// A bus route path with arbitrary extra properties
    pub fn add_route(&mut self, path: &LineString, service: &str, direction: u8, extra: JsonObject) {
        let mut properties = JsonObject::new();
        properties.insert("feature_type".to_string(), serde_json::json!("bus_route"));
        properties.insert("service".to_string(), serde_json::json!(service));
        properties.insert("direction".to_string(), serde_json::json!(direction));
        properties.extend(extra);
        self.features.push(feature(linestring_to_geojson(path), properties));
    }

    /// Each stop of a summary, flagged by whether it lies within a station buffer
    pub fn add_stops(&mut self, summary: &ProximitySummary) {
        for stop in &summary.stops {
            let mut properties = JsonObject::new();
            properties.insert("feature_type".to_string(), serde_json::json!("bus_stop"));
            properties.insert("service".to_string(), serde_json::json!(summary.route.service.as_str()));
            properties.insert("direction".to_string(), serde_json::json!(summary.route.direction.code()));
            properties.insert("sequence".to_string(), serde_json::json!(stop.sequence));
            properties.insert("stop_code".to_string(), serde_json::json!(stop.stop_code));
            properties.insert("description".to_string(), serde_json::json!(stop.description));
            properties.insert("within_buffer".to_string(), serde_json::json!(stop.within_buffer));
            self.features.push(feature(point_to_geojson(&stop.location), properties));
        }
    }

    pub fn add_buffers(&mut self, buffers: &[Polygon], radius_m: f64) {
        for (i, poly) in buffers.iter().enumerate() {
            let mut properties = JsonObject::new();
            properties.insert("feature_type".to_string(), serde_json::json!("station_buffer"));
            properties.insert("index".to_string(), serde_json::json!(i));
            properties.insert("radius_m".to_string(), serde_json::json!(radius_m));
            self.features.push(feature(polygon_to_geojson(poly), properties));
        }
    }

    pub fn into_geojson(self) -> GeoJson {
        GeoJson::from(FeatureCollection {
            bbox: None,
            features: self.features,
            foreign_members: None,
        })
    }

    pub fn write(self, output_path: &Path) -> Result<()> {
        log::info!("Writing {} features to {}", self.len(), output_path.display());

        let json_string =
            serde_json::to_string_pretty(&self.into_geojson()).context("Failed to serialize GeoJSON")?;

        std::fs::write(output_path, json_string)
            .with_context(|| format!("Failed to write GeoJSON to {}", output_path.display()))?;

        Ok(())
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

pub fn print_overlap_table(rows: &[OverlapResult]) {
    println!("{:<6} {:<8} {:>4} {:>12} {:>9}", "Line", "Service", "Dir", "Overlap (m)", "Overlap %");
    for row in rows {
        println!(
            "{:<6} {:<8} {:>4} {:>12.1} {:>8.1}%",
            row.line.as_str(),
            row.route.service.as_str(),
            row.route.direction.code(),
            row.length_m,
            row.percentage
        );
    }
}

pub fn print_proximity_table(summaries: &[ProximitySummary]) {
    println!("{:<8} {:>4} {:>7} {:>6} {:>8}", "Service", "Dir", "Within", "Total", "Share");
    for summary in summaries {
        println!(
            "{:<8} {:>4} {:>7} {:>6} {:>7.1}%",
            summary.route.service.as_str(),
            summary.route.direction.code(),
            summary.within_count,
            summary.total,
            summary.percentage
        );
    }
}

pub fn print_stop_table(summary: &ProximitySummary) {
    println!("{:>4} {:<8} {:<32} {:>6}", "Seq", "Code", "Description", "Within");
    for stop in &summary.stops {
        println!(
            "{:>4} {:<8} {:<32} {:>6}",
            stop.sequence,
            stop.stop_code.as_deref().unwrap_or("-"),
            stop.description.as_deref().unwrap_or("-"),
            if stop.within_buffer { "yes" } else { "no" }
        );
    }
    println!(
        "{}: {} of {} stops within {:.1}%",
        summary.route, summary.within_count, summary.total, summary.percentage
    );
}

pub fn print_alternatives_table(result: &AlternativeOverlap) {
    println!(
        "Reference {} ({:.1} m), threshold {}%",
        result.reference, result.reference_length_m, result.threshold_percent
    );
    println!("{:<8} {:>4} {:>12} {:>9} {:>5}", "Service", "Dir", "Shared (m)", "Shared %", "Alt");
    for candidate in result.candidates.iter().filter(|c| c.shared_length_m > 0.0) {
        println!(
            "{:<8} {:>4} {:>12.1} {:>8.1}% {:>5}",
            candidate.route.service.as_str(),
            candidate.route.direction.code(),
            candidate.shared_length_m,
            candidate.percentage,
            if candidate.exceeds_threshold { "yes" } else { "" }
        );
    }

    let services: Vec<String> = result.overlapping_services().iter().map(|s| s.to_string()).collect();
    println!("{} overlapping routes: {}", result.overlap_count, services.join(", "));
}
