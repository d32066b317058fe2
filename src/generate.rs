use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::record::StudentRecord;

pub const SCORE_MIN: i32 = 55;
pub const SCORE_MAX: i32 = 75;

const FIRST_NAMES: [&str; 30] = [
    "John", "Jane", "Michael", "Sarah", "David", "Emily", "James", "Jessica", "Robert", "Ashley",
    "William", "Amanda", "Christopher", "Jennifer", "Matthew", "Lisa", "Anthony", "Michelle",
    "Mark", "Kimberly", "Donald", "Amy", "Steven", "Angela", "Andrew", "Helen", "Kenneth",
    "Deborah", "Paul", "Dorothy",
];

const LAST_NAMES: [&str; 30] = [
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson",
];

const CLASS_NAMES: [&str; 5] = ["Class1", "Class2", "Class3", "Class4", "Class5"];

// Date-of-birth window: 2000-01-01 ..= 2010-12-31.
fn dob_window_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid literal date")
}

fn dob_window_days() -> i64 {
    let end = NaiveDate::from_ymd_opt(2010, 12, 31).expect("valid literal date");
    end.signed_duration_since(dob_window_start()).num_days()
}

/// Infinite source of synthetic student records.
///
/// Ids are contiguous from `start_id`; names and classes are drawn uniformly
/// from the fixed pools, scores from `SCORE_MIN..=SCORE_MAX`. Pure function of
/// the random source, so a seeded generator is reproducible.
pub struct RecordGenerator<R: Rng> {
    rng: R,
    next_id: i64,
}

impl RecordGenerator<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy(), 1)
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), 1)
    }
}

impl Default for RecordGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RecordGenerator<R> {
    pub fn with_rng(rng: R, start_id: i64) -> Self {
        Self {
            rng,
            next_id: start_id,
        }
    }

    fn next_record(&mut self) -> StudentRecord {
        let student_id = self.next_id;
        self.next_id += 1;

        let days = self.rng.gen_range(0..=dob_window_days());
        StudentRecord {
            student_id,
            first_name: FIRST_NAMES[self.rng.gen_range(0..FIRST_NAMES.len())].to_string(),
            last_name: LAST_NAMES[self.rng.gen_range(0..LAST_NAMES.len())].to_string(),
            date_of_birth: dob_window_start() + Duration::days(days),
            class_name: CLASS_NAMES[self.rng.gen_range(0..CLASS_NAMES.len())].to_string(),
            score: self.rng.gen_range(SCORE_MIN..=SCORE_MAX),
        }
    }
}

impl<R: Rng> Iterator for RecordGenerator<R> {
    type Item = StudentRecord;

    fn next(&mut self) -> Option<StudentRecord> {
        Some(self.next_record())
    }
}
