use chorust::error::PatternError;
use chorust::models::{Frequency, RecurrencePattern};
use chorust::recurrence::{
    generate_occurrences, last_day_of_month, parse_frequency, parse_weekday, validate_pattern,
    weekday_index,
};
use chrono::{Duration, NaiveDate};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn test_daily_yields_every_day() {
    let pattern = RecurrencePattern::daily();
    for (from, to) in [
        (d(2025, 1, 1), d(2025, 1, 1)),
        (d(2025, 1, 1), d(2025, 1, 14)),
        (d(2024, 2, 20), d(2024, 3, 5)),
        (d(2024, 12, 25), d(2025, 1, 10)),
    ] {
        let dates = generate_occurrences(&pattern, from, to);
        assert_eq!(dates.len() as i64, (to - from).num_days() + 1);
        assert_eq!(dates.first(), Some(&from));
        assert_eq!(dates.last(), Some(&to));
        assert!(dates.windows(2).all(|w| w[1] - w[0] == Duration::days(1)));
    }
}

#[test]
fn test_inverted_range_is_empty() {
    let pattern = RecurrencePattern::daily();
    assert!(generate_occurrences(&pattern, d(2025, 1, 2), d(2025, 1, 1)).is_empty());
}

#[test]
fn test_weekly_mon_wed_fri() {
    let pattern = RecurrencePattern::weekly([1, 3, 5]);
    let start = d(2025, 1, 1);
    for offset in 0..14 {
        let from = start + Duration::days(offset);
        let to = from + Duration::days(13);
        let dates = generate_occurrences(&pattern, from, to);
        assert_eq!(dates.len(), 6);
        assert!(dates.iter().all(|d| [1, 3, 5].contains(&weekday_index(*d))));
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }

    // Shorter ranges stay within the boundary-dependent bounds.
    for offset in 0..7 {
        let from = start + Duration::days(offset);
        let dates = generate_occurrences(&pattern, from, from + Duration::days(9));
        assert!((4..=6).contains(&dates.len()), "{} dates from {}", dates.len(), from);
    }
}

#[test]
fn test_weekly_without_days_is_empty() {
    let pattern = RecurrencePattern::weekly(Vec::<u8>::new());
    assert!(generate_occurrences(&pattern, d(2025, 1, 1), d(2025, 3, 1)).is_empty());
}

#[test]
fn test_monthly_clamps_to_last_day() {
    let pattern = RecurrencePattern::monthly(31);
    let dates = generate_occurrences(&pattern, d(2025, 1, 1), d(2025, 4, 30));
    assert_eq!(dates, vec![d(2025, 1, 31), d(2025, 2, 28), d(2025, 3, 31), d(2025, 4, 30)]);

    let leap = generate_occurrences(&pattern, d(2024, 2, 1), d(2024, 2, 29));
    assert_eq!(leap, vec![d(2024, 2, 29)]);
}

#[test]
fn test_monthly_respects_range_edges() {
    let pattern = RecurrencePattern::monthly(15);
    assert!(generate_occurrences(&pattern, d(2025, 1, 16), d(2025, 2, 14)).is_empty());
    assert_eq!(
        generate_occurrences(&pattern, d(2024, 11, 15), d(2025, 1, 15)),
        vec![d(2024, 11, 15), d(2024, 12, 15), d(2025, 1, 15)]
    );
}

#[test]
fn test_pattern_bounds_narrow_the_range() {
    let pattern = RecurrencePattern::daily()
        .starting(d(2025, 1, 5))
        .ending(d(2025, 1, 8));
    assert_eq!(
        generate_occurrences(&pattern, d(2025, 1, 1), d(2025, 1, 31)),
        vec![d(2025, 1, 5), d(2025, 1, 6), d(2025, 1, 7), d(2025, 1, 8)]
    );

    // Entirely before the start or after the end.
    assert!(generate_occurrences(&pattern, d(2024, 12, 1), d(2025, 1, 4)).is_empty());
    assert!(generate_occurrences(&pattern, d(2025, 1, 9), d(2025, 2, 1)).is_empty());

    let monthly = RecurrencePattern::monthly(31).ending(d(2025, 2, 27));
    assert_eq!(
        generate_occurrences(&monthly, d(2025, 1, 1), d(2025, 3, 31)),
        vec![d(2025, 1, 31)]
    );
}

#[test]
fn test_same_input_same_output() {
    let pattern = RecurrencePattern::weekly([0, 6]).starting(d(2025, 1, 3));
    let first = generate_occurrences(&pattern, d(2025, 1, 1), d(2025, 2, 1));
    let second = generate_occurrences(&pattern, d(2025, 1, 1), d(2025, 2, 1));
    assert_eq!(first, second);
}

#[test]
fn test_last_day_of_month() {
    assert_eq!(last_day_of_month(2025, 2), 28);
    assert_eq!(last_day_of_month(2024, 2), 29);
    assert_eq!(last_day_of_month(1900, 2), 28);
    assert_eq!(last_day_of_month(2000, 2), 29);
    assert_eq!(last_day_of_month(2025, 12), 31);
    assert_eq!(last_day_of_month(2025, 4), 30);
}

#[test]
fn test_parse_weekday() {
    assert_eq!(parse_weekday("0"), Ok(0));
    assert_eq!(parse_weekday("mon"), Ok(1));
    assert_eq!(parse_weekday("Thursday"), Ok(4));
    assert_eq!(parse_weekday(" SAT "), Ok(6));
    assert_eq!(parse_weekday("7"), Err(PatternError::WeekdayOutOfRange(7)));
    assert!(matches!(parse_weekday("someday"), Err(PatternError::UnknownWeekday(_))));
}

#[test]
fn test_parse_frequency() {
    let weekly = parse_frequency("weekly", &["mon,thu".to_string()], None).unwrap();
    assert_eq!(weekly, Frequency::Weekly { days_of_week: [1, 4].into_iter().collect() });

    let monthly = parse_frequency("Monthly", &[], None).unwrap();
    assert_eq!(monthly, Frequency::Monthly { day_of_month: 1 });

    assert!(matches!(
        parse_frequency("hourly", &[], None),
        Err(PatternError::UnknownFrequency(_))
    ));
}

#[test]
fn test_validate_pattern() {
    assert!(validate_pattern(&RecurrencePattern::daily()).is_ok());
    assert_eq!(
        validate_pattern(&RecurrencePattern::weekly(Vec::<u8>::new())),
        Err(PatternError::NoWeekdays)
    );
    assert_eq!(
        validate_pattern(&RecurrencePattern::weekly([2, 9])),
        Err(PatternError::WeekdayOutOfRange(9))
    );
    assert_eq!(
        validate_pattern(&RecurrencePattern::monthly(0)),
        Err(PatternError::DayOfMonthOutOfRange(0))
    );
    assert!(matches!(
        validate_pattern(&RecurrencePattern::daily().starting(d(2025, 2, 1)).ending(d(2025, 1, 1))),
        Err(PatternError::InvertedBounds { .. })
    ));
}

#[test]
fn test_pattern_json_shape() {
    let pattern = RecurrencePattern::weekly([1, 4]).ending(d(2025, 6, 30));
    let json = serde_json::to_value(&pattern).unwrap();
    assert_eq!(json["type"], "weekly");
    assert_eq!(json["days_of_week"], serde_json::json!([1, 4]));
    assert_eq!(json["end_date"], "2025-06-30");

    let parsed: RecurrencePattern =
        serde_json::from_str(r#"{"type":"monthly","start_date":null}"#).unwrap();
    assert_eq!(parsed, RecurrencePattern::monthly(1));
}
