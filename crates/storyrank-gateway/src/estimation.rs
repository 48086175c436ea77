//! Turning an estimation reply into the ranked story list

use storyrank_protocol::{Story, Technique};
use storyrank_techniques::{
    enrich_with_ahp, enrich_with_dollars, enrich_with_kano, enrich_with_moscow, enrich_with_wsjf,
    parse_ahp_response, parse_dollar_response, parse_kano_response, parse_moscow_response,
    parse_wsjf_response, validate_dollar_distribution,
};
use tracing::{debug, warn};

fn report_matches(technique: Technique, matched: usize, expected: usize) {
    if matched == 0 {
        warn!(%technique, expected, "No records parsed from estimation reply, using defaults");
    } else if matched < expected {
        warn!(%technique, matched, expected, "Estimation reply covers only part of the batch");
    } else {
        debug!(%technique, matched, "Parsed estimation reply");
    }
}

/// Parse `reply` with the technique's parser and merge it into `stories`.
///
/// Never fails: unparsable replies produce the technique's defaults.
pub fn apply_estimate(technique: Technique, stories: Vec<Story>, reply: &str) -> Vec<Story> {
    let expected = stories.len();
    match technique {
        Technique::HundredDollar => {
            let allocations = parse_dollar_response(reply);
            report_matches(technique, allocations.len(), expected);
            let check = validate_dollar_distribution(&allocations, expected);
            if !check.is_valid() {
                warn!(
                    total = check.total,
                    missing = ?check.missing,
                    unexpected = ?check.unexpected,
                    "Dollar allocation does not cover every story with exactly 100 dollars"
                );
            }
            enrich_with_dollars(stories, &allocations)
        }
        Technique::Wsjf => {
            let estimates = parse_wsjf_response(reply);
            report_matches(technique, estimates.len(), expected);
            enrich_with_wsjf(stories, &estimates)
        }
        Technique::Moscow => {
            let assignments = parse_moscow_response(reply);
            report_matches(technique, assignments.len(), expected);
            enrich_with_moscow(stories, &assignments)
        }
        Technique::Kano => {
            let assignments = parse_kano_response(reply);
            report_matches(technique, assignments.len(), expected);
            enrich_with_kano(stories, &assignments)
        }
        Technique::Ahp => {
            let estimates = parse_ahp_response(reply);
            report_matches(technique, estimates.len(), expected);
            enrich_with_ahp(stories, &estimates)
        }
    }
}
