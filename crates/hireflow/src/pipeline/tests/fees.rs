use crate::pipeline::domain::ExperienceLevel;
use crate::pipeline::fees::{calculate_fee, tier_percentage, FeeConfig, FeeError};

#[test]
fn senior_placement_matches_worked_example() {
    // $150,000 salary in cents at the senior tier.
    let breakdown = calculate_fee(15_000_000, ExperienceLevel::Senior, &FeeConfig::default())
        .expect("fee computes");

    assert_eq!(breakdown.fee_percentage, 18);
    assert_eq!(breakdown.placement_fee, 2_700_000);
    assert_eq!(breakdown.upfront_amount, 1_350_000);
    assert_eq!(breakdown.remaining_amount, 1_350_000);
}

#[test]
fn tiers_follow_experience_level() {
    assert_eq!(tier_percentage(ExperienceLevel::Entry), 15);
    assert_eq!(tier_percentage(ExperienceLevel::Mid), 15);
    assert_eq!(tier_percentage(ExperienceLevel::Senior), 18);
    assert_eq!(tier_percentage(ExperienceLevel::Executive), 20);
}

#[test]
fn split_always_sums_to_placement_fee() {
    let config = FeeConfig::default();
    let levels = [
        ExperienceLevel::Entry,
        ExperienceLevel::Mid,
        ExperienceLevel::Senior,
        ExperienceLevel::Executive,
    ];
    // Odd fees force a rounding remainder; it must land on the remaining
    // leg rather than drift.
    let salaries = [0, 1, 3, 99, 101, 12_345, 777_777, 15_000_000, 999_999_999];

    for level in levels {
        for salary in salaries {
            let breakdown = calculate_fee(salary, level, &config).expect("fee computes");
            assert_eq!(
                breakdown.upfront_amount + breakdown.remaining_amount,
                breakdown.placement_fee,
                "drift for salary {salary} at {level:?}"
            );
        }
    }
}

#[test]
fn uneven_split_keeps_remainder_on_the_back_leg() {
    let config = FeeConfig {
        upfront_percent: 33,
        ..FeeConfig::default()
    };
    let breakdown =
        calculate_fee(1_000_001, ExperienceLevel::Entry, &config).expect("fee computes");

    assert_eq!(breakdown.placement_fee, 150_000);
    assert_eq!(breakdown.upfront_amount, 49_500);
    assert_eq!(breakdown.remaining_amount, 100_500);
}

#[test]
fn negative_salary_is_rejected_not_clamped() {
    let err = calculate_fee(-1, ExperienceLevel::Mid, &FeeConfig::default())
        .expect_err("negative salary fails");
    assert_eq!(err, FeeError::NegativeSalary(-1));
}

#[test]
fn out_of_range_upfront_percent_is_rejected() {
    let config = FeeConfig {
        upfront_percent: 101,
        ..FeeConfig::default()
    };
    let err = calculate_fee(100, ExperienceLevel::Entry, &config)
        .expect_err("percent above 100 fails");
    assert_eq!(err, FeeError::PercentageOutOfRange(101));
}
