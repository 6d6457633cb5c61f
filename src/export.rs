//! Rendering of reconstructed routes for downstream consumers.

use crate::error::Result;
use crate::reconstruct::RouteReconstruction;
use crate::types::SampleOrigin;
use chrono::SecondsFormat;

/// GPX 1.1 document with a single track segment.
///
/// Reconstructed points are tagged with `<type>reconstructed</type>` so
/// viewers can style them differently from observed fixes.
pub fn to_gpx(route: &RouteReconstruction, name: &str) -> String {
    let mut gpx = String::new();

    gpx.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    gpx.push('\n');
    gpx.push_str(r#"<gpx version="1.1" creator="route_gapfill""#);
    gpx.push_str(r#" xmlns="http://www.topografix.com/GPX/1/1""#);
    gpx.push_str(r#" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#);
    gpx.push_str(r#" xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd">"#);
    gpx.push('\n');

    gpx.push_str("  <metadata>\n");
    gpx.push_str(&format!("    <name>{}</name>\n", escape_xml(name)));
    gpx.push_str(&format!(
        "    <desc>{} of {} gaps reconstructed</desc>\n",
        route.summary.filled_count, route.summary.total_gaps
    ));
    gpx.push_str("  </metadata>\n");

    gpx.push_str("  <trk>\n");
    gpx.push_str(&format!("    <name>{}</name>\n", escape_xml(name)));
    gpx.push_str("    <trkseg>\n");

    for sample in &route.samples {
        gpx.push_str(&format!(
            r#"      <trkpt lat="{:.7}" lon="{:.7}">"#,
            sample.latitude, sample.longitude
        ));
        gpx.push('\n');
        gpx.push_str(&format!(
            "        <time>{}</time>\n",
            sample.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        if sample.origin == SampleOrigin::Reconstructed {
            gpx.push_str("        <type>reconstructed</type>\n");
        }
        gpx.push_str("      </trkpt>\n");
    }

    gpx.push_str("    </trkseg>\n");
    gpx.push_str("  </trk>\n");
    gpx.push_str("</gpx>\n");

    gpx
}

pub fn to_json(route: &RouteReconstruction) -> Result<String> {
    Ok(serde_json::to_string_pretty(route)?)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
