pub mod convert;
pub mod currency;
pub mod date;
pub mod equation;
pub mod error;
pub mod evaluator;
pub mod explain;
pub mod financial;
pub mod geometry;
pub mod graphing;
pub mod health;
pub mod history;
pub mod keypad;
pub mod matrix;
pub mod numbers;
pub mod prefs;
pub mod stats;
pub mod store;

pub use convert::{NumberBase, UnitCategory};
pub use currency::RatesSnapshot;
pub use equation::{Polynomial, Root, Solution};
pub use error::{CalcError, CalcResult};
pub use evaluator::{AngleMode, Evaluation, Evaluator};
pub use explain::{AutoLoanDetails, DisabledExplainer, Explainer, Explanation};
pub use graphing::{ChartType, Point};
pub use history::{History, HistoryEntry};
pub use keypad::Keypad;
pub use matrix::Matrix;
pub use prefs::Theme;
pub use store::KeyValueStore;
