//! Shared fixtures for the algo test suites.

use retire_core::{
    Fraction, Megawatts, Orispl, PlantRecord, PlantTable, RetirementStatus, TransitionPreference,
};

/// A plant record with representative defaults; tests override what they
/// care about.
pub fn plant(orispl: &str, capacity_mw: f64, age: u32, capacity_factor: f64) -> PlantRecord {
    PlantRecord {
        name: format!("Plant {}", orispl),
        orispl: Orispl::new(orispl),
        state: "TX".to_string(),
        latitude: 32.5,
        longitude: -97.3,
        capacity: Megawatts(capacity_mw),
        age_years: age,
        status: RetirementStatus::Operating,
        pct_capacity_retiring: Fraction(0.0),
        generator_count: 2,
        utility: format!("Utility {}", orispl),
        capacity_factor: Fraction(capacity_factor),
        fuel_type: "Coal".to_string(),
        transition: TransitionPreference::Renewables,
        pct_difference: 10.0,
        retirement_year: None,
        last_retirement: None,
        opposition: Fraction(0.5),
    }
}

/// The four-plant sample table every suite starts from.
pub fn sample_plants() -> PlantTable {
    let mut a = plant("12345", 500.0, 35, 0.45);
    a.name = "Plant A".to_string();
    a.pct_difference = 15.2;
    a.opposition = Fraction(0.652);

    let mut b = plant("23456", 750.0, 42, 0.62);
    b.name = "Plant B".to_string();
    b.state = "CA".to_string();
    b.status = RetirementStatus::Announced;
    b.pct_capacity_retiring = Fraction(0.3);
    b.transition = TransitionPreference::Coal;
    b.pct_difference = -8.3;
    b.retirement_year = Some(2025);
    b.last_retirement = Some("2025".to_string());
    b.opposition = Fraction(0.428);

    let mut c = plant("34567", 300.0, 28, 0.38);
    c.name = "Plant C".to_string();
    c.state = "OH".to_string();
    c.status = RetirementStatus::Retiring;
    c.pct_capacity_retiring = Fraction(1.0);
    c.generator_count = 1;
    c.transition = TransitionPreference::Coal;
    c.pct_difference = 12.7;
    c.retirement_year = Some(2024);
    c.last_retirement = Some("2024".to_string());
    c.opposition = Fraction(0.713);

    let mut d = plant("45678", 1200.0, 55, 0.71);
    d.name = "Plant D".to_string();
    d.state = "WV".to_string();
    d.generator_count = 4;
    d.pct_difference = 22.1;
    d.opposition = Fraction(0.589);

    PlantTable::new(vec![a, b, c, d])
}
