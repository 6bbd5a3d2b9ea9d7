use netlog_core::Rating;
use serde::Deserialize;

/// Name of the host function the page calls with each metric
pub const WEB_VITALS_BINDING: &str = "logWebVital";

/// Init script that observes LCP, CLS, INP and FID and reports them through the binding
///
/// Bindings accept a single string argument, so metrics are sent as JSON text.
pub const WEB_VITALS_SCRIPT: &str = r#"
(function() {
    function sendMetric(metric) {
        if (typeof window.logWebVital === 'function') {
            window.logWebVital(JSON.stringify({
                name: metric.name,
                value: metric.value,
                rating: metric.rating || 'unknown'
            }));
        }
    }

    function clsRating(value) {
        return value < 0.1 ? 'good' : value < 0.25 ? 'needs-improvement' : 'poor';
    }

    try {
        new PerformanceObserver((list) => {
            const entries = list.getEntries();
            const lastEntry = entries[entries.length - 1];
            const value = lastEntry.renderTime || lastEntry.loadTime;
            const rating = value < 2500 ? 'good' : value < 4000 ? 'needs-improvement' : 'poor';
            sendMetric({ name: 'LCP', value: value, rating: rating });
        }).observe({ type: 'largest-contentful-paint', buffered: true });
    } catch (e) {}

    let clsValue = 0;
    try {
        new PerformanceObserver((list) => {
            for (const entry of list.getEntries()) {
                if (!entry.hadRecentInput) {
                    clsValue += entry.value;
                }
            }
            sendMetric({ name: 'CLS', value: clsValue, rating: clsRating(clsValue) });
        }).observe({ type: 'layout-shift', buffered: true });
    } catch (e) {}

    try {
        new PerformanceObserver((list) => {
            list.getEntries().forEach((entry) => {
                const duration = entry.processingStart - entry.startTime;
                const rating = duration < 200 ? 'good' : duration < 500 ? 'needs-improvement' : 'poor';
                sendMetric({ name: 'INP', value: duration, rating: rating });
            });
        }).observe({ type: 'event', buffered: true, durationThreshold: 16 });
    } catch (e) {}

    try {
        new PerformanceObserver((list) => {
            const firstInput = list.getEntries()[0];
            if (firstInput) {
                const fid = firstInput.processingStart - firstInput.startTime;
                const rating = fid < 100 ? 'good' : fid < 300 ? 'needs-improvement' : 'poor';
                sendMetric({ name: 'FID', value: fid, rating: rating });
            }
        }).observe({ type: 'first-input', buffered: true });
    } catch (e) {}

    window.addEventListener('beforeunload', () => {
        if (clsValue > 0) {
            sendMetric({ name: 'CLS', value: clsValue, rating: clsRating(clsValue) });
        }
    });
})();
"#;

/// One metric sample as reported by the page
#[derive(Debug, Clone, PartialEq)]
pub struct VitalSample {
    pub name: String,
    pub value: f64,
    pub rating: Rating,
}

#[derive(Deserialize)]
struct VitalPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    rating: Option<String>,
}

impl VitalSample {
    /// Parse a binding payload; missing fields take defaults, malformed JSON yields `None`
    pub fn parse(payload: &str) -> Option<Self> {
        let payload: VitalPayload = match serde_json::from_str(payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("Ignoring malformed web vital payload: {}", e);
                return None;
            }
        };

        Some(Self {
            name: payload.name.unwrap_or_default(),
            value: payload.value.unwrap_or(0.0),
            rating: payload
                .rating
                .as_deref()
                .map(Rating::parse)
                .unwrap_or(Rating::Unknown),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_payload() {
        let sample = VitalSample::parse(r#"{"name":"LCP","value":1834.25,"rating":"good"}"#).unwrap();
        assert_eq!(sample.name, "LCP");
        assert_eq!(sample.value, 1834.25);
        assert_eq!(sample.rating, Rating::Good);
    }

    #[test]
    fn test_parse_defaults() {
        let sample = VitalSample::parse(r#"{"name":"INP","value":null}"#).unwrap();
        assert_eq!(sample.value, 0.0);
        assert_eq!(sample.rating, Rating::Unknown);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(VitalSample::parse("not json").is_none());
    }

    #[test]
    fn test_script_uses_binding_name() {
        assert!(WEB_VITALS_SCRIPT.contains(&format!("window.{}", WEB_VITALS_BINDING)));
    }
}
