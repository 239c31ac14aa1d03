//! ThingSpeak-backed sensor analyser
//!
//! Reads the newest feed entry from a ThingSpeak channel (one field per
//! bin sensor), keeps the analysed snapshot in memory for the chat data
//! commands, pushes analysed values back to the write channel, and renders
//! a bar-chart artifact for the graph command.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{AnalyserError, SensorAnalyser, SensorReading};

/// Request timeout for ThingSpeak calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// File name of the rendered graph artifact
const GRAPH_FILE: &str = "bin_fullness.svg";

/// ThingSpeak channel analyser
pub struct ThingSpeakAnalyser {
    http: Client,
    read_url: String,
    write_url: String,
    write_key: String,
    tags: Vec<String>,
    artifact_dir: PathBuf,
    /// Latest analysed snapshot plus its report text
    snapshot: RwLock<Option<Snapshot>>,
}

struct Snapshot {
    /// Readings paired with their source channel field number; a feed
    /// entry can be missing fields, so positions here do not line up
    /// with field numbers
    entries: Vec<(usize, SensorReading)>,
    report: String,
}

#[derive(Debug, Deserialize)]
struct FeedsResponse {
    feeds: Vec<serde_json::Value>,
}

impl ThingSpeakAnalyser {
    /// Create an analyser for one channel
    ///
    /// `tags` gives the display name for each channel field, in order:
    /// `field1` maps to `tags[0]` and so on.
    pub fn new(
        api_base: &str,
        channel_id: u64,
        read_key: &str,
        write_key: &str,
        tags: Vec<String>,
        artifact_dir: impl Into<PathBuf>,
    ) -> Result<Self, AnalyserError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base = api_base.trim_end_matches('/');

        Ok(Self {
            http,
            read_url: format!(
                "{}/channels/{}/feeds.json?results=1&api_key={}",
                base, channel_id, read_key
            ),
            write_url: format!("{}/update", base),
            write_key: write_key.to_string(),
            tags,
            artifact_dir: artifact_dir.into(),
            snapshot: RwLock::new(None),
        })
    }

    /// Parse one feed entry into readings, clamping to `[0, 100]`
    ///
    /// Each reading keeps its source field number: a null or unparseable
    /// field is skipped, so later readings must not inherit its slot.
    fn analyse_feed(&self, feed: &serde_json::Value) -> Vec<(usize, SensorReading)> {
        self.tags
            .iter()
            .enumerate()
            .filter_map(|(i, tag)| {
                let field = i + 1;
                let raw = feed.get(format!("field{}", field))?;
                let value = match raw {
                    serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
                    serde_json::Value::Number(n) => n.as_f64()?,
                    _ => return None,
                };
                Some((
                    field,
                    SensorReading {
                        tag: tag.clone(),
                        fullness_percent: value.clamp(0.0, 100.0),
                    },
                ))
            })
            .collect()
    }

    /// Build the update form body, addressing each value by its source
    /// field number rather than its position among the surviving readings
    fn upstream_params(write_key: &str, entries: &[(usize, SensorReading)]) -> Vec<(String, String)> {
        let mut params = vec![("api_key".to_string(), write_key.to_string())];
        for (field, r) in entries {
            params.push((format!("field{}", field), format!("{:.2}", r.fullness_percent)));
        }
        params
    }

    fn build_report(readings: &[SensorReading]) -> String {
        let mut lines = vec![format!(
            "Bin fullness analysis ({})",
            Utc::now().format("%Y-%m-%d %H:%M UTC")
        )];
        for r in readings {
            lines.push(format!("- {}: {:.2}% full", r.tag, r.fullness_percent));
        }
        if !readings.is_empty() {
            let average = readings.iter().map(|r| r.fullness_percent).sum::<f64>() / readings.len() as f64;
            // f64 has no total order; compare on the percent value directly
            let fullest = readings
                .iter()
                .max_by(|a, b| a.fullness_percent.total_cmp(&b.fullness_percent))
                .unwrap();
            lines.push(format!("Average fullness: {:.2}%", average));
            lines.push(format!(
                "Most full: {} at {:.2}%",
                fullest.tag, fullest.fullness_percent
            ));
        }
        lines.join("\n")
    }

    /// Render a minimal SVG bar chart of the readings
    fn render_svg(readings: &[SensorReading], path: &Path) -> Result<(), AnalyserError> {
        const BAR_HEIGHT: usize = 28;
        const BAR_GAP: usize = 12;
        const CHART_WIDTH: usize = 420;
        const LABEL_WIDTH: usize = 90;

        let height = readings.len() * (BAR_HEIGHT + BAR_GAP) + BAR_GAP;
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\">\n",
            LABEL_WIDTH + CHART_WIDTH + 60,
            height
        );

        for (i, r) in readings.iter().enumerate() {
            let y = BAR_GAP + i * (BAR_HEIGHT + BAR_GAP);
            let width = (r.fullness_percent / 100.0 * CHART_WIDTH as f64).round() as usize;
            let colour = if r.fullness_percent >= 80.0 { "#d9534f" } else { "#5cb85c" };
            svg.push_str(&format!(
                "<text x=\"0\" y=\"{}\" font-size=\"13\">{}</text>\n",
                y + BAR_HEIGHT / 2 + 4,
                r.tag
            ));
            svg.push_str(&format!(
                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"/>\n",
                LABEL_WIDTH, y, width, BAR_HEIGHT, colour
            ));
            svg.push_str(&format!(
                "<text x=\"{}\" y=\"{}\" font-size=\"13\">{:.1}%</text>\n",
                LABEL_WIDTH + width + 6,
                y + BAR_HEIGHT / 2 + 4,
                r.fullness_percent
            ));
        }
        svg.push_str("</svg>\n");

        std::fs::write(path, svg)?;
        Ok(())
    }
}

#[async_trait]
impl SensorAnalyser for ThingSpeakAnalyser {
    async fn refresh(&self) -> Result<Vec<SensorReading>, AnalyserError> {
        debug!("Fetching latest channel feed");
        let response = self.http.get(&self.read_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnalyserError::Api(status.as_u16()));
        }

        let feeds: FeedsResponse = response.json().await?;
        let feed = feeds.feeds.last().ok_or(AnalyserError::NoData)?;
        let entries = self.analyse_feed(feed);
        debug!(count = entries.len(), "Analysed feed entry");

        let readings: Vec<SensorReading> = entries.iter().map(|(_, r)| r.clone()).collect();
        let report = Self::build_report(&readings);
        *self.snapshot.write().expect("snapshot lock poisoned") = Some(Snapshot { entries, report });

        Ok(readings)
    }

    fn sensor_count(&self) -> usize {
        self.tags.len()
    }

    async fn push_upstream(&self) -> Result<(), AnalyserError> {
        let params = {
            let guard = self.snapshot.read().expect("snapshot lock poisoned");
            let snapshot = guard.as_ref().ok_or(AnalyserError::NoData)?;
            Self::upstream_params(&self.write_key, &snapshot.entries)
        };

        let response = self.http.post(&self.write_url).form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnalyserError::Api(status.as_u16()));
        }
        debug!("Pushed analysed snapshot upstream");
        Ok(())
    }

    async fn render_graph(&self) -> Result<PathBuf, AnalyserError> {
        let readings: Vec<SensorReading> = {
            let guard = self.snapshot.read().expect("snapshot lock poisoned");
            let snapshot = guard.as_ref().ok_or(AnalyserError::NoData)?;
            snapshot.entries.iter().map(|(_, r)| r.clone()).collect()
        };

        tokio::fs::create_dir_all(&self.artifact_dir).await?;
        let path = self.artifact_dir.join(GRAPH_FILE);
        Self::render_svg(&readings, &path)?;
        info!(path = %path.display(), "Rendered fullness graph");
        Ok(path)
    }

    fn report(&self) -> Option<String> {
        self.snapshot
            .read()
            .expect("snapshot lock poisoned")
            .as_ref()
            .map(|s| s.report.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn analyser(tags: &[&str]) -> ThingSpeakAnalyser {
        ThingSpeakAnalyser::new(
            "https://api.thingspeak.com",
            2622766,
            "readkey",
            "writekey",
            tags.iter().map(|t| t.to_string()).collect(),
            TempDir::new().unwrap().keep(),
        )
        .unwrap()
    }

    #[test]
    fn test_analyse_feed_maps_fields_to_tags() {
        let a = analyser(&["Bin-1", "Bin-2"]);
        let feed = json!({
            "created_at": "2026-08-29T10:00:00Z",
            "entry_id": 9,
            "field1": "85.5",
            "field2": "12.0",
        });

        let entries = a.analyse_feed(&feed);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (1, SensorReading {
            tag: "Bin-1".to_string(),
            fullness_percent: 85.5,
        }));
        assert_eq!(entries[1], (2, SensorReading {
            tag: "Bin-2".to_string(),
            fullness_percent: 12.0,
        }));
    }

    #[test]
    fn test_analyse_feed_clamps_and_skips_bad_values() {
        let a = analyser(&["Bin-1", "Bin-2", "Bin-3"]);
        let feed = json!({
            "field1": "130.0",
            "field2": "not-a-number",
            "field3": -4.0,
        });

        let entries = a.analyse_feed(&feed);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1.fullness_percent, 100.0);
        assert_eq!(entries[1].0, 3);
        assert_eq!(entries[1].1.tag, "Bin-3");
        assert_eq!(entries[1].1.fullness_percent, 0.0);
    }

    #[test]
    fn test_missing_field_does_not_shift_upstream_slots() {
        let a = analyser(&["Bin-1", "Bin-2", "Bin-3"]);
        let feed = json!({
            "field1": "40.0",
            "field2": null,
            "field3": "90.0",
        });

        let entries = a.analyse_feed(&feed);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].0, 3);
        assert_eq!(entries[1].1.tag, "Bin-3");

        // Bin-3's value goes back out as field3, not the vacated field2
        let params = ThingSpeakAnalyser::upstream_params("writekey", &entries);
        assert_eq!(params[0], ("api_key".to_string(), "writekey".to_string()));
        assert_eq!(params[1], ("field1".to_string(), "40.00".to_string()));
        assert_eq!(params[2], ("field3".to_string(), "90.00".to_string()));
        assert!(!params.iter().any(|(k, _)| k == "field2"));
    }

    #[test]
    fn test_report_mentions_every_bin() {
        let readings = vec![
            SensorReading {
                tag: "Bin-1".to_string(),
                fullness_percent: 85.0,
            },
            SensorReading {
                tag: "Bin-2".to_string(),
                fullness_percent: 15.0,
            },
        ];
        let report = ThingSpeakAnalyser::build_report(&readings);
        assert!(report.contains("Bin-1: 85.00% full"));
        assert!(report.contains("Bin-2: 15.00% full"));
        assert!(report.contains("Average fullness: 50.00%"));
        assert!(report.contains("Most full: Bin-1 at 85.00%"));
    }

    #[test]
    fn test_render_svg_writes_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(GRAPH_FILE);
        let readings = vec![SensorReading {
            tag: "Bin-1".to_string(),
            fullness_percent: 92.0,
        }];

        ThingSpeakAnalyser::render_svg(&readings, &path).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Bin-1"));
        assert!(svg.contains("92.0%"));
        // Over-threshold bars are the alert colour
        assert!(svg.contains("#d9534f"));
    }

    #[test]
    fn test_no_data_before_first_refresh() {
        let a = analyser(&["Bin-1"]);
        assert!(a.report().is_none());
        assert_eq!(a.sensor_count(), 1);
    }
}
