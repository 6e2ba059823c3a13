use chrono::{DateTime, Utc};

use crate::models::{RecommendationSet, UserId};
use crate::services::presenter::{self, RenderedRecommendations};

const TITLE: &str = "Movie Recommendation System using SVD";

/// Seconds between reloads of the loading page
const REFRESH_SECS: u32 = 5;

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem auto;max-width:60rem;padding:0 1rem}\
code{background:#f2f2f2;padding:0 .25rem}\
ul.recs{list-style:none;padding:0}ul.recs li{padding:.35rem 0;border-bottom:1px solid #eee}\
.notice{color:#555;font-style:italic}.error{color:#a40000;border-left:4px solid #a40000;padding-left:1rem}\
footer{margin-top:2rem;color:#777;font-size:.85rem}";

/// User selection coming from the `?user=` query parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
    /// No parameter; the first user is shown
    Default,
    User(UserId),
    /// Present but not a user id
    Invalid,
}

impl Selection {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Selection::Default,
            Some(value) => value
                .parse::<u32>()
                .map(|id| Selection::User(UserId(id)))
                .unwrap_or(Selection::Invalid),
        }
    }
}

/// Page shown while the table is being computed
pub fn loading_page(started_at: DateTime<Utc>) -> String {
    let head = format!(r#"<meta http-equiv="refresh" content="{}">"#, REFRESH_SECS);
    let body = format!(
        r#"<p class="notice">Computing recommendations (started {}). This page refreshes automatically.</p>"#,
        started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    page(&head, &body)
}

/// Fatal state: no selector is rendered
pub fn failed_page(error: &str) -> String {
    let body = format!(
        r#"<div class="error"><h2>Recommendations could not be loaded</h2><p>{}</p></div>"#,
        escape_html(error)
    );
    page("", &body)
}

/// Selector plus the recommendations of the selected user
pub fn ready_page(set: &RecommendationSet, selection: Selection) -> String {
    let users = presenter::enumerate_users(&set.table);
    let selected = match selection {
        Selection::Default => presenter::select_user(&users, None),
        Selection::User(user_id) => presenter::select_user(&users, Some(user_id)),
        Selection::Invalid => None,
    };

    let mut body = String::new();
    body.push_str("<h2>👤 Choose a User ID to View Recommendations</h2>");
    body.push_str(&user_selector(&users, selected));

    let rendered = match selected {
        Some(user_id) => presenter::render(&set.table, user_id),
        None => RenderedRecommendations::Unavailable,
    };
    let label = selected
        .map(|id| format!(" for User <code>{}</code>", id))
        .unwrap_or_default();

    match &rendered {
        RenderedRecommendations::Lines(lines) => {
            body.push_str(&format!(
                "<h2>Top {} Recommendations{}:</h2>",
                lines.len(),
                label
            ));
            body.push_str(r#"<ul class="recs">"#);
            for line in lines {
                body.push_str(&format!("<li>📽️ {}</li>", escape_html(line)));
            }
            body.push_str("</ul>");
        }
        _ => {
            body.push_str(&format!("<h2>Recommendations{}:</h2>", label));
            if let Some(message) = rendered.message() {
                body.push_str(&format!(
                    r#"<p class="notice">{}</p>"#,
                    escape_html(message)
                ));
            }
        }
    }

    body.push_str(&footer(set));
    page("", &body)
}

fn user_selector(users: &[UserId], selected: Option<UserId>) -> String {
    let mut html = String::from(
        r#"<form method="get" action="/"><label for="user">Select User ID</label> <select id="user" name="user" onchange="this.form.submit()">"#,
    );
    for user_id in users {
        let marker = if Some(*user_id) == selected { " selected" } else { "" };
        html.push_str(&format!(
            r#"<option value="{0}"{1}>{0}</option>"#,
            user_id, marker
        ));
    }
    html.push_str(r#"</select> <noscript><button type="submit">Show</button></noscript></form>"#);
    html
}

fn footer(set: &RecommendationSet) -> String {
    let mut html = format!(
        "<footer>Source: {} · generated {}",
        set.source,
        set.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(evaluation) = &set.evaluation {
        html.push_str(&format!(
            " · holdout RMSE {:.4}, MAE {:.4} over {} ratings",
            evaluation.rmse, evaluation.mae, evaluation.test_size
        ));
    }
    html.push_str("</footer>");
    html
}

fn page(head: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html lang="en"><head><meta charset="utf-8"><title>SVD Recommender</title>{head}<style>{style}</style></head><body><h1>🎬 {title}</h1>{body}</body></html>"#,
        head = head,
        style = STYLE,
        title = TITLE,
        body = body
    )
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Evaluation, MovieId, Recommendation, RecommendationTable};
    use crate::services::presenter::{EMPTY_STATE_MESSAGE, UNAVAILABLE_MESSAGE};

    fn scenario_set() -> RecommendationSet {
        let mut table = RecommendationTable::new();
        table.insert(
            UserId(1),
            vec![
                Recommendation::new(MovieId(42), 4.8),
                Recommendation::new(MovieId(17), 4.5),
            ],
        );
        table.insert(UserId(2), vec![]);
        RecommendationSet::new(table, "snapshot")
    }

    #[test]
    fn test_selection_parse() {
        assert_eq!(Selection::parse(None), Selection::Default);
        assert_eq!(Selection::parse(Some("")), Selection::Default);
        assert_eq!(Selection::parse(Some(" 7 ")), Selection::User(UserId(7)));
        assert_eq!(Selection::parse(Some("seven")), Selection::Invalid);
        assert_eq!(Selection::parse(Some("-1")), Selection::Invalid);
    }

    #[test]
    fn test_default_selection_shows_first_user() {
        let html = ready_page(&scenario_set(), Selection::Default);

        assert!(html.contains(TITLE));
        assert!(html.contains("Choose a User ID to View Recommendations"));
        assert!(html.contains(r#"<option value="1" selected>1</option>"#));
        assert!(html.contains(r#"<option value="2">2</option>"#));
        assert!(html.contains("Top 2 Recommendations for User <code>1</code>"));

        let first = html.find("Movie ID: 42 | Predicted Rating: 4.80").unwrap();
        let second = html.find("Movie ID: 17 | Predicted Rating: 4.50").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_empty_user_shows_empty_state() {
        let html = ready_page(&scenario_set(), Selection::User(UserId(2)));
        assert!(html.contains(r#"<option value="2" selected>2</option>"#));
        assert!(html.contains(&escape_html(EMPTY_STATE_MESSAGE)));
        assert!(!html.contains("Movie ID:"));
    }

    #[test]
    fn test_unknown_and_invalid_users_show_unavailable() {
        for selection in [Selection::User(UserId(99)), Selection::Invalid] {
            let html = ready_page(&scenario_set(), selection);
            assert!(html.contains(&escape_html(UNAVAILABLE_MESSAGE)));
            assert!(!html.contains(" selected>"));
            assert!(html.contains("<select"));
        }
    }

    #[test]
    fn test_footer_reports_evaluation() {
        let set = scenario_set().with_evaluation(Some(Evaluation {
            rmse: 0.87321,
            mae: 0.67,
            test_size: 25000,
        }));
        let html = ready_page(&set, Selection::Default);
        assert!(html.contains("holdout RMSE 0.8732, MAE 0.6700 over 25000 ratings"));
    }

    #[test]
    fn test_failed_page_has_no_selector() {
        let html = failed_page("Recommendation contract violated: snapshot does not bind `top_n`");
        assert!(!html.contains("<select"));
        assert!(html.contains("snapshot does not bind `top_n`"));
    }

    #[test]
    fn test_failed_page_escapes_message() {
        let html = failed_page("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_loading_page_refreshes() {
        let html = loading_page(Utc::now());
        assert!(html.contains(r#"http-equiv="refresh""#));
        assert!(!html.contains("<select"));
    }
}
