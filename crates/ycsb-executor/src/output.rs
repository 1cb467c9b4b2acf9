//! Parsing of YCSB's text measurement output.
//!
//! YCSB prints one measurement per line in the form
//! `[SECTION], Metric name, value`, e.g.
//!
//! ```text
//! [OVERALL], RunTime(ms), 10012
//! [OVERALL], Throughput(ops/sec), 499.4
//! [INSERT], Operations, 5000
//! ```

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub section: String,
    pub metric: String,
    pub value: f64,
}

/// Everything a single YCSB process produced.
#[derive(Debug, Clone, Default)]
pub struct YcsbOutput {
    pub stdout: String,
    pub stderr: String,
    pub samples: Vec<Sample>,
}

impl YcsbOutput {
    pub fn find(&self, section: &str, metric: &str) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.section == section && s.metric == metric)
            .map(|s| s.value)
    }

    pub fn throughput(&self) -> Option<f64> {
        self.find("OVERALL", "Throughput(ops/sec)")
    }

    pub fn runtime_ms(&self) -> Option<f64> {
        self.find("OVERALL", "RunTime(ms)")
    }
}

/// Extract every measurement line from YCSB output. Status lines, warnings
/// and non-numeric values are skipped.
pub fn parse_ycsb_output(text: &str) -> Vec<Sample> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Sample> {
    let line = line.trim();
    let rest = line.strip_prefix('[')?;
    let (section, rest) = rest.split_once("],")?;
    let (metric, value) = rest.rsplit_once(',')?;
    let value = value.trim().parse::<f64>().ok()?;
    Some(Sample {
        section: section.trim().to_string(),
        metric: metric.trim().to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
Loading workload...
Starting test.
2024-01-01 00:00:10:000 10 sec: 5000 operations; 499.4 current ops/sec;
[OVERALL], RunTime(ms), 10012
[OVERALL], Throughput(ops/sec), 499.4
[INSERT], Operations, 5000
[INSERT], AverageLatency(us), 1520.3
[INSERT], Return=OK, 5000
[CLEANUP], Return=n/a, x
";

    #[test]
    fn test_parse_measurements() {
        let samples = parse_ycsb_output(OUTPUT);
        assert_eq!(samples.len(), 5);
        assert_eq!(
            samples[1],
            Sample {
                section: "OVERALL".to_string(),
                metric: "Throughput(ops/sec)".to_string(),
                value: 499.4,
            }
        );
        assert_eq!(samples[4].metric, "Return=OK");
    }

    #[test]
    fn test_output_lookups() {
        let output = YcsbOutput {
            samples: parse_ycsb_output(OUTPUT),
            ..Default::default()
        };
        assert_eq!(output.throughput(), Some(499.4));
        assert_eq!(output.runtime_ms(), Some(10012.0));
        assert_eq!(output.find("READ", "Operations"), None);
    }

    #[test]
    fn test_parse_ignores_noise() {
        assert!(parse_ycsb_output("").is_empty());
        assert!(parse_ycsb_output("[OVERALL] missing commas").is_empty());
        assert!(parse_ycsb_output("OVERALL, RunTime(ms), 1").is_empty());
    }
}
