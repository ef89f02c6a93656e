//! End-to-end resolution scenarios against stubbed collaborators

mod helpers;

use helpers::*;
use refcat_resolve::capabilities::ComparisonVerdict;
use refcat_resolve::sources::YearWindow;
use refcat_resolve::types::{
    PositionalDetails, RawReference, ResolutionStatus, ResolveError, WorkType,
};

const HILL: &str = "[Hill '79] J. Hill, Some Title, 1979.";

#[tokio::test]
async fn test_hill_scenario_matches_in_year_window_stage() {
    let parser = StubParser::new(|_| Ok(parsed("Some Title", Some(1979), &["J. Hill"])));
    let primary = StubPrimary::new(|query| {
        if query.search.as_deref() == Some("Some Title Hill")
            && query.year_window == Some(YearWindow { from: 1976, to: 1982 })
        {
            Ok(vec![work("W1", "Some Title", 1979, vec![author("John Hill", &["MIT"])])])
        } else {
            Ok(Vec::new())
        }
    });
    let comparator = StubComparator::first_candidate();
    let secondary = StubSecondary::empty();

    let resolver = resolver(
        parser,
        StubClassifier::returning(WorkType::Book),
        comparator.clone(),
        primary.clone(),
        secondary.clone(),
        &test_config(),
    );
    let report = resolver.resolve_batch(&[RawReference::from(HILL)]).await;
    let record = &report.records[0];

    assert_eq!(primary.calls(), 3, "1a, 1b, then 2a hits");
    assert_eq!(comparator.calls(), 1);
    assert_eq!(secondary.calls(), 0, "fallback only runs without a match");

    assert_eq!(record.title, "Some Title");
    assert_eq!(record.year, Some(1979));
    assert_eq!(record.first_author.name, "John Hill");
    assert_eq!(record.first_author.affiliations, vec!["MIT"]);
    assert_eq!(record.last_author.name, "John Hill");
    assert_eq!(record.reference_raw, HILL);
    assert!(record.notes.contains("matched to W1"));
    assert_eq!(record.status, ResolutionStatus::Matched);
    assert_eq!(report.counts.matched, 1);
}

#[tokio::test]
async fn test_stage_1a_hit_skips_later_stages() {
    let primary = StubPrimary::new(|_| Ok(vec![work("W5", "Some Title", 1979, vec![])]));

    let resolver = resolver(
        StubParser::new(|_| Ok(parsed("Some Title", Some(1979), &["J. Hill"]))),
        StubClassifier::returning(WorkType::Book),
        StubComparator::first_candidate(),
        primary.clone(),
        StubSecondary::empty(),
        &test_config(),
    );
    resolver.resolve_batch(&[RawReference::from(HILL)]).await;

    let queries = primary.queries.lock().unwrap();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].work_type, Some(WorkType::Book));
    assert!(queries[0].title_search.is_some());
}

#[tokio::test]
async fn test_empty_cascade_and_empty_fallback_keeps_parsed_fields() {
    let comparator = StubComparator::first_candidate();
    let secondary = StubSecondary::empty();

    let resolver = resolver(
        StubParser::new(|_| Ok(parsed("Some Title", Some(1979), &["J. Hill", "K. Lee"]))),
        StubClassifier::returning(WorkType::Unknown),
        comparator.clone(),
        StubPrimary::empty(),
        secondary.clone(),
        &test_config(),
    );
    let report = resolver.resolve_batch(&[RawReference::from(HILL)]).await;
    let record = &report.records[0];

    assert_eq!(comparator.calls(), 0, "no candidates, no comparison");
    assert_eq!(secondary.calls(), 2, "year-qualified query, then without year");
    assert_eq!(record.title, "Some Title");
    assert_eq!(record.first_author.name, "J. Hill");
    assert_eq!(record.last_author.name, "K. Lee");
    assert!(record.notes.contains("no confident match"));
    assert!(record.notes.contains("secondary fallback: no results"));
    assert_eq!(record.status, ResolutionStatus::Unmatched);
}

#[tokio::test]
async fn test_merge_precedence_across_sources() {
    // Primary knows the first author's affiliation only
    let primary = StubPrimary::new(|_| {
        Ok(vec![work(
            "W1",
            "Some Title",
            1979,
            vec![author("John Hill", &["Primary Uni"]), author("Kim Lee", &[])],
        )])
    });
    let parser = StubParser::new(|_| {
        let mut fields = parsed("Some Title", Some(1979), &["J. Hill", "K. Lee"]);
        fields.first_author = PositionalDetails {
            affiliations: vec!["Parsed Uni A".to_string()],
            emails: Vec::new(),
        };
        fields.last_author = PositionalDetails {
            affiliations: vec!["Parsed Uni B".to_string()],
            emails: Vec::new(),
        };
        Ok(fields)
    });

    let resolver = resolver(
        parser,
        StubClassifier::returning(WorkType::Book),
        StubComparator::first_candidate(),
        primary,
        StubSecondary::empty(),
        &test_config(),
    );
    let record = resolver
        .resolve_one(0, &RawReference::from(HILL))
        .await;

    assert_eq!(record.first_author.affiliations, vec!["Primary Uni"]);
    assert_eq!(record.last_author.name, "Kim Lee");
    assert_eq!(record.last_author.affiliations, vec!["Parsed Uni B"]);
}

#[tokio::test]
async fn test_secondary_fills_only_empty_fields() {
    let secondary = StubSecondary::new(|_| {
        Ok(vec![paper(
            "P1",
            "Some Title",
            vec![author("Jo Hill", &["S2 Uni"]), author("Kim Lee", &["S2 Lab"])],
        )])
    });
    let parser = StubParser::new(|_| {
        let mut fields = parsed("Some Title", Some(1979), &["J. Hill", "K. Lee"]);
        fields.first_author.affiliations = vec!["Parsed Uni".to_string()];
        Ok(fields)
    });

    let resolver = resolver(
        parser,
        StubClassifier::returning(WorkType::Book),
        StubComparator::never(),
        StubPrimary::new(|_| Ok(vec![work("W1", "Other Title", 2001, vec![])])),
        secondary.clone(),
        &test_config(),
    );
    let record = resolver.resolve_one(0, &RawReference::from(HILL)).await;

    assert_eq!(secondary.calls(), 1);
    assert_eq!(record.first_author.name, "J. Hill");
    assert_eq!(record.first_author.affiliations, vec!["Parsed Uni"]);
    assert_eq!(record.last_author.affiliations, vec!["S2 Lab"]);
    assert_eq!(record.status, ResolutionStatus::FallbackFilled);
    assert_eq!(
        record.notes.entries(),
        &[
            "no confident match".to_string(),
            "no candidate matches the title".to_string(),
            "filled from secondary fallback".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_rate_limited_fallback_is_non_fatal() {
    let secondary =
        StubSecondary::new(|_| Err(ResolveError::RateLimited("429 Too Many Requests".into())));

    let resolver = resolver(
        StubParser::new(|_| Ok(parsed("Some Title", Some(1979), &["J. Hill"]))),
        StubClassifier::returning(WorkType::Book),
        StubComparator::never(),
        StubPrimary::empty(),
        secondary.clone(),
        &test_config(),
    );
    let record = resolver.resolve_one(0, &RawReference::from(HILL)).await;

    assert_eq!(secondary.calls(), 2, "bounded to two attempts");
    assert_eq!(record.status, ResolutionStatus::Unmatched);
    assert!(record.notes.contains("secondary fallback: rate limited"));
    assert_eq!(record.first_author.name, "J. Hill");
}

#[tokio::test]
async fn test_primary_failures_become_notes() {
    let primary = StubPrimary::new(|_| Err(ResolveError::Source("connection refused".into())));

    let resolver = resolver(
        StubParser::new(|_| Ok(parsed("Some Title", None, &["J. Hill"]))),
        StubClassifier::returning(WorkType::Unknown),
        StubComparator::first_candidate(),
        primary.clone(),
        StubSecondary::empty(),
        &test_config(),
    );
    let record = resolver.resolve_one(0, &RawReference::from(HILL)).await;

    // No type filter, no year: only 1a and 2a are planned
    assert_eq!(primary.calls(), 2);
    assert!(record.notes.contains("connection refused"));
    assert_ne!(record.status, ResolutionStatus::Failed);
}

#[tokio::test]
async fn test_comparator_failure_degrades_to_no_match() {
    let comparator =
        StubComparator::new(|_| Err(ResolveError::Capability("model unavailable".into())));

    let resolver = resolver(
        StubParser::new(|_| Ok(parsed("Some Title", Some(1979), &["J. Hill"]))),
        StubClassifier::returning(WorkType::Book),
        comparator,
        StubPrimary::new(|_| Ok(vec![work("W1", "Some Title", 1979, vec![])])),
        StubSecondary::empty(),
        &test_config(),
    );
    let record = resolver.resolve_one(0, &RawReference::from(HILL)).await;

    assert!(record.notes.contains("no confident match"));
    assert!(record.notes.contains("model unavailable"));
    assert_eq!(record.status, ResolutionStatus::Unmatched);
}

#[tokio::test]
async fn test_comparator_sees_simplified_candidates() {
    let comparator = StubComparator::new(|_| {
        Ok(ComparisonVerdict {
            chosen_id: Some("https://openalex.org/W1".to_string()),
            rationale: "same title, year differs".to_string(),
        })
    });

    let resolver = resolver(
        StubParser::new(|_| Ok(parsed("Some Title", Some(1980), &["J. Hill"]))),
        StubClassifier::returning(WorkType::Book),
        comparator.clone(),
        StubPrimary::new(|_| {
            Ok(vec![work("W1", "Some Title", 1979, vec![author("John Hill", &["MIT"])])])
        }),
        StubSecondary::empty(),
        &test_config(),
    );
    let record = resolver.resolve_one(0, &RawReference::from(HILL)).await;

    let requests = comparator.requests.lock().unwrap();
    assert_eq!(requests[0].candidates[0].authors, vec!["John Hill"]);
    assert_eq!(requests[0].parsed_year, Some(1980));
    assert_eq!(requests[0].work_type, WorkType::Book);
    assert!(record.notes.contains("matched to W1"));
}

#[tokio::test]
async fn test_empty_parsed_title_is_synthesized_and_cascade_skipped() {
    let primary = StubPrimary::empty();
    let secondary = StubSecondary::empty();

    let resolver = resolver(
        StubParser::new(|_| Ok(parsed("", None, &["J. Hill"]))),
        StubClassifier::returning(WorkType::Book),
        StubComparator::first_candidate(),
        primary.clone(),
        secondary.clone(),
        &test_config(),
    );
    let record = resolver.resolve_one(0, &RawReference::from(HILL)).await;

    assert_eq!(primary.calls(), 0);
    assert_eq!(secondary.calls(), 0);
    assert_eq!(record.title, HILL);
    assert_eq!(record.first_author.name, "J. Hill");
}

#[tokio::test]
async fn test_raw_text_emails_are_never_dropped() {
    const RAW: &str = "[Hill '79] J. Hill (jhill@uni.edu), Some Title, 1979.";

    let resolver = resolver(
        StubParser::new(|_| Ok(parsed("Some Title", Some(1979), &["J. Hill"]))),
        StubClassifier::returning(WorkType::Book),
        StubComparator::never(),
        StubPrimary::empty(),
        StubSecondary::empty(),
        &test_config(),
    );
    let record = resolver.resolve_one(0, &RawReference::from(RAW)).await;

    assert_eq!(record.first_author.emails, vec!["jhill@uni.edu"]);
}
