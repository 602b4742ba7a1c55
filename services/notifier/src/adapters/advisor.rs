//! services/notifier/src/adapters/advisor.rs
//!
//! Day-pillar advice: the stem/branch name of a day, its element, the lucky
//! hours for its branch and, when the owner's birth date is known, how the day
//! sits with their lunar birth year.

use crate::adapters::calendar::LunarDate;
use chrono::{Datelike, NaiveDate};
use lunar_notify_core::ports::ContentAdvisor;

const STEMS: [&str; 10] = [
    "Giáp", "Ất", "Bính", "Đinh", "Mậu", "Kỷ", "Canh", "Tân", "Nhâm", "Quý",
];

const BRANCHES: [&str; 12] = [
    "Tý", "Sửu", "Dần", "Mão", "Thìn", "Tỵ", "Ngọ", "Mùi", "Thân", "Dậu", "Tuất", "Hợi",
];

const STEM_DIRECTIONS: [&str; 10] = [
    "East",
    "Southeast",
    "South",
    "South",
    "Center",
    "Center",
    "West",
    "Southwest",
    "North",
    "Northeast",
];

/// Lucky double-hours, indexed by the day's branch.
const LUCKY_HOURS: [[usize; 6]; 12] = [
    [0, 1, 3, 6, 8, 9],
    [0, 1, 4, 7, 9, 10],
    [1, 2, 5, 8, 10, 11],
    [2, 3, 6, 9, 11, 0],
    [3, 4, 7, 10, 0, 1],
    [4, 5, 8, 11, 1, 2],
    [5, 6, 9, 0, 2, 3],
    [6, 7, 10, 1, 3, 4],
    [7, 8, 11, 2, 4, 5],
    [8, 9, 0, 3, 5, 6],
    [9, 10, 1, 4, 6, 7],
    [10, 11, 2, 5, 7, 8],
];

/// Julian day number of 0000-12-31 in the proleptic Gregorian calendar.
const JDN_OFFSET: i64 = 1_721_425;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Wood,
    Fire,
    Earth,
    Metal,
    Water,
}

impl Element {
    const CYCLE: [Element; 5] = [
        Element::Wood,
        Element::Fire,
        Element::Earth,
        Element::Metal,
        Element::Water,
    ];

    fn of_stem(stem: usize) -> Self {
        Self::CYCLE[(stem / 2) % 5]
    }

    fn index(self) -> usize {
        self as usize
    }

    fn generates(self, other: Element) -> bool {
        Self::CYCLE[(self.index() + 1) % 5] == other
    }

    fn overcomes(self, other: Element) -> bool {
        Self::CYCLE[(self.index() + 2) % 5] == other
    }

    fn name(self) -> &'static str {
        match self {
            Element::Wood => "Wood",
            Element::Fire => "Fire",
            Element::Earth => "Earth",
            Element::Metal => "Metal",
            Element::Water => "Water",
        }
    }
}

fn day_pillar(date: NaiveDate) -> (usize, usize) {
    let jdn = i64::from(date.num_days_from_ce()) + JDN_OFFSET;
    (
        (jdn + 9).rem_euclid(10) as usize,
        (jdn + 1).rem_euclid(12) as usize,
    )
}

fn year_pillar(year: i32) -> (usize, usize) {
    let offset = i64::from(year) - 4;
    (offset.rem_euclid(10) as usize, offset.rem_euclid(12) as usize)
}

/// Stem-branch name of a lunar year, e.g. 2024 is "Giáp Thìn".
pub(crate) fn year_name(year: i32) -> String {
    let (stem, branch) = year_pillar(year);
    format!("{} {}", STEMS[stem], BRANCHES[branch])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DayPillarAdvisor;

impl DayPillarAdvisor {
    pub fn new() -> Self {
        Self
    }

    fn personal_line(&self, day_element: Element, day_branch: usize, birth: NaiveDate) -> String {
        // Births before the lunar new year belong to the previous lunar year.
        let birth_year = LunarDate::from_solar(birth).map_or(birth.year(), |lunar| lunar.year);
        let (birth_stem, birth_branch) = year_pillar(birth_year);
        let own = Element::of_stem(birth_stem);

        let outlook = if own == day_element {
            "a balanced day for you"
        } else if day_element.generates(own) {
            "a supportive day for you"
        } else if own.generates(day_element) {
            "a draining day, pace yourself"
        } else if day_element.overcomes(own) {
            "a challenging day, avoid big decisions"
        } else {
            "a good day to take the lead"
        };

        let mut line = format!("Your year element is {}: {}.", own.name(), outlook);
        if (day_branch + 6) % 12 == birth_branch {
            line.push_str(&format!(
                " The day's {} branch clashes with your {} birth year.",
                BRANCHES[day_branch], BRANCHES[birth_branch]
            ));
        }
        line
    }
}

impl ContentAdvisor for DayPillarAdvisor {
    fn advice(&self, date: NaiveDate, birth_date: Option<NaiveDate>) -> Option<String> {
        let (stem, branch) = day_pillar(date);
        let element = Element::of_stem(stem);
        let hours = LUCKY_HOURS[branch]
            .iter()
            .map(|&b| BRANCHES[b])
            .collect::<Vec<_>>()
            .join(", ");

        let mut lines = vec![
            format!(
                "Day: {} {} ({})",
                STEMS[stem],
                BRANCHES[branch],
                element.name()
            ),
            format!("Lucky direction: {}", STEM_DIRECTIONS[stem]),
            format!("Lucky hours: {}", hours),
        ];

        if let Some(birth) = birth_date {
            lines.push(self.personal_line(element, branch, birth));
            if (birth.month(), birth.day()) == (date.month(), date.day()) {
                lines.push("Happy birthday!".to_string());
            }
        }

        Some(lines.join("\n"))
    }
}
