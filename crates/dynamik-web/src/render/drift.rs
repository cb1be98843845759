//! Drift detail page: one chart panel per recognised cause.

use std::sync::OnceLock;

use regex::Regex;

use dynamik_common::{DriftCause, DriftDetails};

use super::{escape, page};

/// How the client draws a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    TimeDistribution,
    Rate,
    Calendar,
    Policies,
    ActivityProfile,
    ResourceProfile,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::TimeDistribution => "time-distribution",
            ChartKind::Rate => "rate",
            ChartKind::Calendar => "calendar",
            ChartKind::Policies => "policies",
            ChartKind::ActivityProfile => "activity-profile",
            ChartKind::ResourceProfile => "resource-profile",
        }
    }
}

struct PanelRule {
    title: &'static str,
    kind: ChartKind,
    pattern: Regex,
    /// Take every matching cause instead of the first.
    all: bool,
}

/// Panel order on the page.
const PANELS: &[(&str, ChartKind, &str, bool)] = &[
    ("Cycle times distribution", ChartKind::TimeDistribution, r"^cycle-time$", false),

    ("Processing times distribution", ChartKind::TimeDistribution, r"processing-time$", false),
    ("Processing times with resources on-duty", ChartKind::TimeDistribution, r"processing-time/available$", false),
    ("Processing times with resources off-duty", ChartKind::TimeDistribution, r"processing-time/unavailable$", false),

    ("Waiting times distribution", ChartKind::TimeDistribution, r"waiting-time$", false),
    ("Waiting times due to batching", ChartKind::TimeDistribution, r"waiting-time/batching$", false),
    ("Waiting times due to contention", ChartKind::TimeDistribution, r"waiting-time/contention$", false),
    ("Waiting times due to prioritization", ChartKind::TimeDistribution, r"waiting-time/prioritization$", false),
    ("Waiting times due to unavailability", ChartKind::TimeDistribution, r"waiting-time/unavailability$", false),
    ("Waiting times due to extraneous factors", ChartKind::TimeDistribution, r"waiting-time/extraneous$", false),

    ("Arrival rate", ChartKind::Rate, r"arrival-rates", false),
    ("Service rate", ChartKind::Rate, r"service-rates", false),
    ("Resource calendars", ChartKind::Calendar, r"calendars", false),
    ("Batching policies", ChartKind::Policies, r"batch-creation|batch-firing", true),
    ("Prioritization policies", ChartKind::Policies, r"prioritization-policies", true),

    ("Activity profile", ChartKind::ActivityProfile, r"activity-profiles", false),
    ("Resource profiles", ChartKind::ResourceProfile, r"resource-profiles", false),
];

fn panel_rules() -> &'static [PanelRule] {
    static RULES: OnceLock<Vec<PanelRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        PANELS
            .iter()
            .filter_map(|(title, kind, pattern, all)| {
                Regex::new(pattern).ok().map(|pattern| PanelRule { title: *title, kind: *kind, pattern, all: *all })
            })
            .collect()
    })
}

#[derive(Debug)]
pub struct ChartPanel<'a> {
    pub title: &'static str,
    pub kind: ChartKind,
    pub causes: Vec<&'a DriftCause>,
}

/// Panels with at least one matching cause, in page order.
pub fn chart_panels(causes: &[DriftCause]) -> Vec<ChartPanel<'_>> {
    panel_rules()
        .iter()
        .filter_map(|rule| {
            let matching = causes.iter().filter(|c| rule.pattern.is_match(&c.cause));
            let selected: Vec<&DriftCause> = if rule.all {
                matching.collect()
            } else {
                matching.take(1).collect()
            };
            (!selected.is_empty()).then(|| ChartPanel { title: rule.title, kind: rule.kind, causes: selected })
        })
        .collect()
}

fn panel_html(panel: &ChartPanel<'_>) -> String {
    // `</` inside a script element would end it early.
    let data = serde_json::to_string(&panel.causes)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", r"<\/");

    format!(r#"
        <section class="chart-panel" data-chart="{}">
            <h3>{}</h3>
            <div class="chart"></div>
            <script type="application/json" class="chart-data">{}</script>
        </section>"#,
        panel.kind.as_str(),
        escape(panel.title),
        data)
}

pub fn drift_page(experiment_id: &str, details: &DriftDetails) -> String {
    let panels = chart_panels(&details.causes);
    let content = if panels.is_empty() {
        r#"<p class="text-muted">No causes were reported for this drift.</p>"#.to_string()
    } else {
        panels.iter().map(panel_html).collect()
    };

    let body = format!(r#"
    <nav class="drift-nav">
        <button type="button" class="btn" onclick="window.print()">Print</button>
        <a href="/results/{id}" class="btn">Close</a>
    </nav>
    <article class="drift-report">
        <header>
            <h1>Experiment {id}</h1>
            <h2>Drift {}</h2>
            <p>{}</p>
            <a href="/results/{id}/{}/download">Download JSON</a>
        </header>
        <div class="chart-panels">{}
        </div>
    </article>"#,
        details.overview.index + 1,
        escape(&details.overview.description),
        details.overview.index,
        content,
        id = escape(experiment_id));

    page(
        "Drift details",
        &body,
        r#"<script src="/static/js/charts.js"></script>"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynamik_common::DriftOverview;
    use serde_json::json;

    fn cause(name: &str) -> DriftCause {
        DriftCause { cause: name.into(), reference: json!([1, 2, 3]), running: json!([4, 5, 6]) }
    }

    fn titles(causes: &[DriftCause]) -> Vec<&'static str> {
        chart_panels(causes).iter().map(|p| p.title).collect()
    }

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(panel_rules().len(), PANELS.len());
    }

    #[test]
    fn test_cycle_time_matches_exactly() {
        assert_eq!(titles(&[cause("cycle-time")]), vec!["Cycle times distribution"]);
        assert_eq!(
            titles(&[cause("cycle-time/waiting-time/batching")]),
            vec!["Waiting times due to batching"]
        );
    }

    #[test]
    fn test_panels_without_data_are_omitted() {
        assert!(chart_panels(&[]).is_empty());
        assert!(chart_panels(&[cause("something-else")]).is_empty());
    }

    #[test]
    fn test_policy_panels_collect_every_match() {
        let causes = [
            cause("waiting-time/batching/batch-creation"),
            cause("waiting-time/batching/batch-firing"),
        ];
        let panels = chart_panels(&causes);
        let policies = panels.iter().find(|p| p.title == "Batching policies").unwrap();
        assert_eq!(policies.causes.len(), 2);
        assert_eq!(policies.kind, ChartKind::Policies);
    }

    #[test]
    fn test_drift_page_embeds_data() {
        let details = DriftDetails {
            overview: DriftOverview {
                index: 2,
                experiment: "exp".into(),
                description: "Waiting time grew".into(),
                reference_window: Default::default(),
                running_window: Default::default(),
            },
            causes: vec![DriftCause {
                cause: "cycle-time".into(),
                reference: json!("</script>"),
                running: json!(null),
            }],
        };
        let html = drift_page("exp", &details);
        assert!(html.contains("Drift 3"));
        assert!(html.contains(r#"data-chart="time-distribution""#));
        assert!(html.contains(r"<\/script>"));
        assert!(html.contains(r#"href="/results/exp/2/download""#));
    }
}
