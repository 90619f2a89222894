use chrono::{Local, NaiveDate};

/// A source of "today" for the rules.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// The local calendar date of the machine.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always the same day. Used with `--today` and in tests.
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// The clock selected on the command line.
pub fn from_override(today: Option<NaiveDate>) -> Box<dyn Clock> {
    match today {
        Some(day) => Box::new(FixedClock(day)),
        None => Box::new(SystemClock),
    }
}
