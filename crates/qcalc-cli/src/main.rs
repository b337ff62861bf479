mod config;

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};

use qcalc_core::convert::{self, to_precision, UNIT_PRECISION};
use qcalc_core::date::{self, parse_date};
use qcalc_core::evaluator::{format_number, SCIENTIFIC_CONSTANTS};
use qcalc_core::financial::{
    self, AutoLoanInput, FilingStatus, InflationMode, MortgageInput, PaymentUnknown, TimeUnit,
};
use qcalc_core::geometry::{self, CircleMeasure, RightSide, Shape};
use qcalc_core::graphing::{self, ChartType, Point};
use qcalc_core::health::{
    self, ActivityLevel, Gender, Goal, MacroPlan, PregnancyMethod, UnitSystem,
};
use qcalc_core::history::{load_history, save_history};
use qcalc_core::keypad::MemoryKey;
use qcalc_core::matrix::{self, MatrixOp};
use qcalc_core::numbers::{self, Fraction, FractionOp};
use qcalc_core::{
    currency, equation, prefs, stats, AngleMode, CalcResult, Evaluator, Explainer,
    HistoryEntry, Keypad, KeyValueStore, Matrix, NumberBase, Theme, UnitCategory,
};
use qcalc_remote::{DisabledExplainer, GeminiExplainer, RatesClient};
use qcalc_store::SqliteStore;

use config::Config;

#[derive(Parser)]
#[command(
    name = "qcalc",
    version,
    about = "Scientific calculator, converters and everyday calculators"
)]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression and record it in the history
    Eval {
        /// Expression, e.g. "sin(30) + 2^3"
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        expression: Vec<String>,

        /// Angle mode (overrides config)
        #[arg(short, long)]
        angle: Option<AngleMode>,

        /// Skip the AI explanation
        #[arg(long)]
        no_explain: bool,
    },

    /// Replay keypad presses, e.g. `7 × ( 2 + 3 ) =`
    Keys {
        /// Digits, operators, functions ending in "(", =, C, DEL, 2nd, MC/MR/MS/M+/M-
        #[arg(required = true, allow_hyphen_values = true)]
        keys: Vec<String>,

        #[arg(short, long)]
        angle: Option<AngleMode>,
    },

    /// Calculation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Chart data from functions and data sets
    Graph {
        #[command(subcommand)]
        chart: GraphCommand,
    },

    /// Descriptive statistics
    Stats {
        #[command(subcommand)]
        action: StatsCommand,
    },

    /// Square matrix operations, rows separated by ';'
    #[command(allow_negative_numbers = true)]
    Matrix {
        op: CliMatrixOp,

        /// Matrix A, e.g. "1 2; 3 4"
        #[arg(allow_hyphen_values = true)]
        a: Option<String>,

        /// Matrix B for add, subtract and multiply
        #[arg(allow_hyphen_values = true)]
        b: Option<String>,

        /// Fill A (and B) with random integers of this size instead
        #[arg(long, value_parser = clap::value_parser!(u8).range(2..=4))]
        random: Option<u8>,
    },

    /// Solve a linear or quadratic equation in x
    Solve {
        /// Equation, e.g. "x^2 - 5x + 6 = 0"
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        equation: Vec<String>,
    },

    /// Math and geometry tools
    Tool {
        #[command(subcommand)]
        tool: ToolCommand,
    },

    /// Convert between units
    #[command(allow_negative_numbers = true)]
    Units {
        /// length, mass, temperature, time or data
        category: Option<UnitCategory>,
        value: Option<f64>,
        from: Option<String>,
        to: Option<String>,

        /// List the units of each category
        #[arg(long)]
        list: bool,
    },

    /// Show a value in binary, octal, decimal and hexadecimal
    #[command(allow_negative_numbers = true)]
    Base {
        /// Value to convert
        #[arg(allow_hyphen_values = true)]
        value: String,

        /// Base the value is written in
        #[arg(short, long, default_value = "dec")]
        from: NumberBase,
    },

    /// Currency conversion with live rates
    Currency {
        #[command(subcommand)]
        action: CurrencyCommand,
    },

    /// Loans, savings and tax
    Finance {
        #[command(subcommand)]
        calc: FinanceCommand,
    },

    /// Date arithmetic
    Date {
        #[command(subcommand)]
        action: DateCommand,
    },

    /// Health and fitness calculators
    Health {
        /// Measurement system for weights and lengths
        #[arg(short, long, global = true, default_value = "metric")]
        units: UnitSystem,

        #[command(subcommand)]
        calc: HealthCommand,
    },

    /// Show or change the colour theme
    Theme {
        /// New theme (dark or light)
        theme: Option<Theme>,

        /// Switch to the other theme
        #[arg(short, long, conflicts_with = "theme")]
        toggle: bool,
    },

    /// Show active configuration
    Config,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List recent calculations
    List {
        /// Only favorites
        #[arg(short, long)]
        favorites: bool,
    },

    /// Filter by expression or result text
    Search { term: String },

    /// Toggle the favorite flag of an entry
    Fav {
        /// Entry timestamp as shown by `history list`
        timestamp: String,
    },

    /// Remove every entry
    Clear,

    /// Export the history
    Export {
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-evaluate an entry
    Load { timestamp: String },
}

#[derive(Clone, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum GraphCommand {
    /// Sample y = f(x) over a range
    #[command(allow_negative_numbers = true)]
    Function {
        /// Function of x, e.g. "x^2 - 3"
        #[arg(allow_hyphen_values = true)]
        expression: String,

        #[arg(long, default_value = "-10", allow_hyphen_values = true)]
        x_min: String,

        #[arg(long, default_value = "10", allow_hyphen_values = true)]
        x_max: String,

        #[arg(short, long)]
        angle: Option<AngleMode>,

        /// Print points as JSON
        #[arg(long)]
        json: bool,
    },

    /// `x, y` per line (file or stdin)
    Scatter {
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },

    /// `Label, Value` per line (file or stdin)
    Bar {
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },

    /// Numbers (file or stdin) grouped into bins
    Histogram {
        file: Option<PathBuf>,
        #[arg(short, long, default_value = "5")]
        bins: usize,
        #[arg(long)]
        json: bool,
    },

    /// `Label, Value` per line (file or stdin)
    Pie {
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum StatsCommand {
    /// Count, mean, median, mode, quartiles and spread
    Summary {
        #[arg(required = true, allow_hyphen_values = true)]
        data: Vec<String>,
    },

    /// Population and sample standard deviation
    Deviation {
        #[arg(required = true, allow_hyphen_values = true)]
        data: Vec<String>,
    },

    /// Frequency polygon points
    Polygon {
        #[arg(required = true, allow_hyphen_values = true)]
        data: Vec<String>,
        #[arg(short, long, default_value = "5")]
        bins: usize,
    },

    /// Confidence interval for a mean
    #[command(allow_negative_numbers = true)]
    Interval {
        mean: f64,
        std_dev: f64,
        n: u64,
        /// 80, 85, 90, 95, 98 or 99
        #[arg(short, long, default_value = "95")]
        level: u32,
    },
}

#[derive(Clone, ValueEnum)]
enum CliMatrixOp {
    Add,
    Subtract,
    Multiply,
    Determinant,
    Inverse,
    Transpose,
}

impl From<CliMatrixOp> for MatrixOp {
    fn from(val: CliMatrixOp) -> Self {
        match val {
            CliMatrixOp::Add => MatrixOp::Add,
            CliMatrixOp::Subtract => MatrixOp::Subtract,
            CliMatrixOp::Multiply => MatrixOp::Multiply,
            CliMatrixOp::Determinant => MatrixOp::Determinant,
            CliMatrixOp::Inverse => MatrixOp::Inverse,
            CliMatrixOp::Transpose => MatrixOp::Transpose,
        }
    }
}

impl CliMatrixOp {
    fn is_binary(&self) -> bool {
        matches!(self, Self::Add | Self::Subtract | Self::Multiply)
    }
}

#[derive(Subcommand)]
enum ToolCommand {
    /// Greatest common factor and least common multiple
    Gcd {
        #[arg(required = true, allow_hyphen_values = true)]
        numbers: Vec<String>,
    },

    /// Prime factorization
    Factor { n: u64 },

    /// Primes up to a limit
    Primes { limit: usize },

    /// Fraction arithmetic, e.g. `fraction 1/2 + 1/3`
    #[command(allow_negative_numbers = true)]
    Fraction {
        #[arg(allow_hyphen_values = true)]
        a: String,
        op: FractionOp,
        #[arg(allow_hyphen_values = true)]
        b: String,
    },

    /// Permutations nPr
    Perm { n: u64, k: u64 },

    /// Combinations nCr
    Comb { n: u64, k: u64 },

    /// Round to a number of decimals
    #[command(allow_negative_numbers = true)]
    Round {
        value: f64,
        #[arg(default_value = "2")]
        decimals: u32,
    },

    /// base^exponent
    #[command(allow_negative_numbers = true)]
    Power { base: f64, exponent: f64 },

    /// n-th root
    #[command(allow_negative_numbers = true)]
    Root {
        value: f64,
        #[arg(default_value = "2")]
        n: f64,
    },

    /// Logarithm in any base
    Log {
        value: f64,
        #[arg(default_value = "10")]
        base: f64,
    },

    /// Solve a : b = c : d, leave one blank
    #[command(allow_negative_numbers = true)]
    Ratio {
        #[arg(long)]
        a: Option<f64>,
        #[arg(long)]
        b: Option<f64>,
        #[arg(long)]
        c: Option<f64>,
        #[arg(long)]
        d: Option<f64>,
    },

    /// Percentage problems
    #[command(allow_negative_numbers = true)]
    Percent {
        #[arg(value_enum)]
        mode: PercentMode,
        x: f64,
        y: f64,
    },

    /// Random integers
    #[command(allow_negative_numbers = true)]
    Random {
        #[arg(default_value = "1")]
        min: i64,
        #[arg(default_value = "100")]
        max: i64,
        #[arg(short, long, default_value = "1")]
        count: usize,
    },

    /// Solve a triangle from three sides
    Triangle { a: f64, b: f64, c: f64 },

    /// Circle measures from one known value
    Circle {
        #[arg(value_enum)]
        known: CliCircle,
        value: f64,
    },

    /// Solve a² + b² = c² for one side
    Pythagoras {
        #[arg(value_enum)]
        solve: CliSide,
        #[arg(long, default_value = "0")]
        a: f64,
        #[arg(long, default_value = "0")]
        b: f64,
        #[arg(long, default_value = "0")]
        c: f64,
    },

    /// Distance between two points
    #[command(allow_negative_numbers = true)]
    Distance { x1: f64, y1: f64, x2: f64, y2: f64 },

    /// Area of a rectangle, triangle or circle
    Area {
        #[arg(value_enum)]
        shape: CliShape,
        /// width height | base height | radius
        #[arg(required = true)]
        dims: Vec<f64>,
    },

    /// Scientific constants
    Constants,
}

#[derive(Clone, ValueEnum)]
enum PercentMode {
    /// x% of y
    Of,
    /// x is what % of y
    WhatPercent,
    /// x is y% of what
    Whole,
}

#[derive(Clone, ValueEnum)]
enum CliCircle {
    Radius,
    Diameter,
    Circumference,
    Area,
}

impl From<CliCircle> for CircleMeasure {
    fn from(val: CliCircle) -> Self {
        match val {
            CliCircle::Radius => CircleMeasure::Radius,
            CliCircle::Diameter => CircleMeasure::Diameter,
            CliCircle::Circumference => CircleMeasure::Circumference,
            CliCircle::Area => CircleMeasure::Area,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum CliSide {
    A,
    B,
    C,
}

impl From<CliSide> for RightSide {
    fn from(val: CliSide) -> Self {
        match val {
            CliSide::A => RightSide::A,
            CliSide::B => RightSide::B,
            CliSide::C => RightSide::C,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum CliShape {
    Rectangle,
    Triangle,
    Circle,
}

#[derive(Subcommand)]
enum CurrencyCommand {
    /// Convert an amount (defaults to the last-used pair)
    Convert {
        amount: f64,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Treat the amount as the target and compute what it costs
        #[arg(short, long)]
        reverse: bool,
    },

    /// Latest rates against a base currency
    Rates {
        #[arg(default_value = "USD")]
        base: String,
    },

    /// Daily rate history for the pair
    History {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Days back from today (overrides config)
        #[arg(short, long)]
        days: Option<u64>,
    },

    /// AI market commentary for the pair
    Insight {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },

    /// Supported currency codes and names
    List,
}

#[derive(Subcommand)]
enum FinanceCommand {
    /// Monthly payment and yearly balance for a loan
    Loan {
        amount: f64,
        /// Annual rate in percent
        rate: f64,
        years: u32,
    },

    /// Month-by-month amortization schedule
    Amortize { amount: f64, rate: f64, years: u32 },

    /// Find the APR behind a payment
    Rate {
        principal: f64,
        payment: f64,
        years: u32,
    },

    /// Mortgage payment with tax, insurance and PMI
    Mortgage {
        price: f64,
        #[arg(short, long, default_value = "0")]
        down: f64,
        #[arg(short, long, default_value = "6.5")]
        rate: f64,
        #[arg(short, long, default_value = "30")]
        years: u32,
        /// Annual property tax
        #[arg(long, default_value = "0")]
        tax: f64,
        /// Annual insurance
        #[arg(long, default_value = "0")]
        insurance: f64,
        /// Annual PMI rate in percent (charged under 20% down)
        #[arg(long, default_value = "0.5")]
        pmi: f64,
    },

    /// Auto loan with trade-in, fees and sales tax
    Auto {
        price: f64,
        #[arg(short, long, default_value = "0")]
        down: f64,
        #[arg(long, default_value = "0")]
        trade_in: f64,
        #[arg(long, default_value = "0")]
        fees: f64,
        #[arg(long, default_value = "0")]
        sales_tax: f64,
        #[arg(short, long, default_value = "7")]
        rate: f64,
        #[arg(short, long, default_value = "5")]
        years: u32,
        /// Ask the AI for an affordability analysis
        #[arg(long)]
        analyze: bool,
    },

    /// Compound growth with regular contributions
    Invest {
        principal: f64,
        #[arg(short, long, default_value = "0")]
        contribution: f64,
        #[arg(short, long)]
        rate: f64,
        #[arg(short, long)]
        years: u32,
        /// Compounding periods per year
        #[arg(short, long, default_value = "12")]
        frequency: u32,
    },

    /// Savings projection until retirement
    Retire {
        #[arg(long)]
        age: u32,
        #[arg(long)]
        retire_at: u32,
        #[arg(long, default_value = "0")]
        savings: f64,
        #[arg(long, default_value = "0")]
        monthly: f64,
        #[arg(short, long, default_value = "7")]
        rate: f64,
    },

    /// Simple interest
    Simple {
        principal: f64,
        rate: f64,
        time: f64,
        #[arg(short, long, default_value = "years")]
        unit: CliTimeUnit,
    },

    /// Solve for the one missing loan value
    Solve {
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        rate: Option<f64>,
        #[arg(long)]
        term: Option<f64>,
        #[arg(long)]
        payment: Option<f64>,
    },

    /// Purchasing power over time
    Inflation {
        amount: f64,
        rate: f64,
        years: u32,
        /// Value in the past rather than the future
        #[arg(long)]
        past: bool,
    },

    /// US federal income tax
    Tax {
        income: f64,
        #[arg(short, long, default_value = "single")]
        status: CliFilingStatus,
    },

    /// Sales tax on a price
    Sales {
        price: f64,
        rate: f64,
        /// Price already includes tax
        #[arg(short, long)]
        reverse: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum CliTimeUnit {
    Years,
    Months,
    Days,
}

impl From<CliTimeUnit> for TimeUnit {
    fn from(val: CliTimeUnit) -> Self {
        match val {
            CliTimeUnit::Years => TimeUnit::Years,
            CliTimeUnit::Months => TimeUnit::Months,
            CliTimeUnit::Days => TimeUnit::Days,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum CliFilingStatus {
    Single,
    Married,
}

impl From<CliFilingStatus> for FilingStatus {
    fn from(val: CliFilingStatus) -> Self {
        match val {
            CliFilingStatus::Single => FilingStatus::Single,
            CliFilingStatus::Married => FilingStatus::MarriedFilingJointly,
        }
    }
}

#[derive(Subcommand)]
enum DateCommand {
    /// Years, months and days between two dates
    Diff { start: String, end: String },

    /// Add (or subtract) years, months and days
    #[command(allow_negative_numbers = true)]
    Add {
        date: String,
        #[arg(short, long, default_value = "0")]
        years: i32,
        #[arg(short, long, default_value = "0")]
        months: i32,
        #[arg(short, long, default_value = "0")]
        days: i64,
        /// Subtract instead of add
        #[arg(long)]
        subtract: bool,
    },
}

#[derive(Subcommand)]
enum HealthCommand {
    /// Body mass index
    Bmi {
        weight: f64,
        /// Height in cm (metric) or inches (imperial)
        height: f64,
        /// Feet, added to the inches given as height (imperial)
        #[arg(long)]
        feet: Option<f64>,
    },

    /// US Navy body fat estimate
    BodyFat {
        #[arg(short, long)]
        gender: Gender,
        #[arg(long)]
        height: f64,
        #[arg(long)]
        waist: f64,
        #[arg(long)]
        neck: f64,
        /// Required for women
        #[arg(long)]
        hip: Option<f64>,
    },

    /// Ideal weight by four published formulas
    Ideal {
        #[arg(short, long)]
        gender: Gender,
        height: f64,
        #[arg(long)]
        feet: Option<f64>,
    },

    /// Maximum heart rate and training zones
    HeartRate { age: u32 },

    /// Daily calorie needs and macronutrient split
    Calories {
        #[arg(short, long)]
        gender: Gender,
        #[arg(long)]
        age: u32,
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        height: f64,
        /// sedentary, light, moderate, active, extra
        #[arg(short, long, default_value = "light")]
        activity: ActivityLevel,
        /// maintenance, mild-loss, loss, mild-gain, gain
        #[arg(long, default_value = "maintenance")]
        goal: Goal,
        /// balanced, low-carb, high-protein
        #[arg(long, default_value = "balanced")]
        plan: MacroPlan,
    },

    /// Running pace; give any two of distance, time and pace
    Pace {
        #[arg(short, long)]
        distance: Option<f64>,
        /// h:mm:ss
        #[arg(short, long)]
        time: Option<String>,
        /// m:ss per km or mile
        #[arg(short, long)]
        pace: Option<String>,
    },

    /// Lean body mass from weight and body fat
    Lbm { weight: f64, body_fat: f64 },

    /// Daily water intake
    Water {
        weight: f64,
        /// Minutes of exercise per day
        #[arg(short, long, default_value = "0")]
        exercise: f64,
    },

    /// Due date and progress
    Pregnancy {
        /// First day of the last period (or conception date with --conception)
        date: String,
        #[arg(long)]
        conception: bool,
    },

    /// Blood alcohol estimate
    Bac {
        #[arg(short, long)]
        gender: Gender,
        weight: f64,
        drinks: u32,
        hours: f64,
    },
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("dev", "qcalc", "qcalc")
        .map(|dirs| dirs.data_dir().join("qcalc.db"))
        .unwrap_or_else(|| PathBuf::from("qcalc.db"))
}

fn open_store(db: Option<PathBuf>, cfg: &Config) -> Result<SqliteStore> {
    let path = db
        .or_else(|| cfg.store.path.as_ref().map(PathBuf::from))
        .unwrap_or_else(default_db_path);
    SqliteStore::new(&path).context("failed to open database")
}

fn init_explainer(cfg: &Config) -> Box<dyn Explainer> {
    match cfg.ai.api_key() {
        Some(key) => {
            let mut explainer = GeminiExplainer::new(key, Duration::from_secs(cfg.ai.timeout_secs))
                .with_model(&cfg.ai.model);
            if let Some(url) = &cfg.ai.base_url {
                explainer = explainer.with_base_url(url);
            }
            Box::new(explainer)
        }
        None => Box::new(DisabledExplainer),
    }
}

fn rates_client(cfg: &Config) -> RatesClient {
    RatesClient::new(
        &cfg.currency.rates_url,
        &cfg.currency.history_url,
        Duration::from_secs(cfg.currency.timeout_secs),
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config()?;

    match cli.command {
        Commands::Eval {
            expression,
            angle,
            no_explain,
        } => {
            let store = open_store(cli.db, &cfg)?;
            let explainer: Box<dyn Explainer> = if no_explain {
                Box::new(DisabledExplainer)
            } else {
                init_explainer(&cfg)
            };
            cmd_eval(&store, &cfg, explainer.as_ref(), &expression.join(" "), angle)?;
        }
        Commands::Keys { keys, angle } => {
            let store = open_store(cli.db, &cfg)?;
            cmd_keys(&store, &cfg, &keys, angle)?;
        }
        Commands::History { action } => {
            let store = open_store(cli.db, &cfg)?;
            cmd_history(&store, &cfg, action)?;
        }
        Commands::Graph { chart } => {
            let store = open_store(cli.db, &cfg)?;
            cmd_graph(&store, &cfg, chart)?;
        }
        Commands::Stats { action } => cmd_stats(action)?,
        Commands::Matrix { op, a, b, random } => cmd_matrix(op, a, b, random)?,
        Commands::Solve { equation } => cmd_solve(&equation.join(" "))?,
        Commands::Tool { tool } => cmd_tool(tool)?,
        Commands::Units {
            category,
            value,
            from,
            to,
            list,
        } => cmd_units(category, value, from, to, list)?,
        Commands::Base { value, from } => cmd_base(&value, from)?,
        Commands::Currency { action } => {
            let store = open_store(cli.db, &cfg)?;
            let explainer = init_explainer(&cfg);
            cmd_currency(&store, &cfg, explainer.as_ref(), action)?;
        }
        Commands::Finance { calc } => {
            let explainer = init_explainer(&cfg);
            cmd_finance(explainer.as_ref(), calc)?;
        }
        Commands::Date { action } => cmd_date(action)?,
        Commands::Health { units, calc } => cmd_health(units, calc)?,
        Commands::Theme { theme, toggle } => {
            let store = open_store(cli.db, &cfg)?;
            cmd_theme(&store, theme, toggle)?;
        }
        Commands::Config => cmd_config(&cfg)?,
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Calculator commands
// ---------------------------------------------------------------------------

fn evaluator_for(cfg: &Config, angle: Option<AngleMode>) -> Evaluator {
    Evaluator::new(angle.unwrap_or(cfg.calculator.angle_mode))
}

fn keypad_for(cfg: &Config, angle: Option<AngleMode>) -> Keypad {
    Keypad::new(evaluator_for(cfg, angle)).with_precision(cfg.calculator.precision)
}

/// Append to the stored history. A failed write is logged and the
/// calculation still counts.
fn record(store: &dyn KeyValueStore, cfg: &Config, entry: HistoryEntry) {
    let mut history = load_history(store, cfg.history.limit);
    history.add(entry);
    if let Err(e) = save_history(store, &history) {
        tracing::warn!("could not save history: {e}");
    }
}

fn cmd_eval(
    store: &dyn KeyValueStore,
    cfg: &Config,
    explainer: &dyn Explainer,
    input: &str,
    angle: Option<AngleMode>,
) -> Result<()> {
    let ev = evaluator_for(cfg, angle).evaluate(input)?;
    let display = format_number(ev.value, cfg.calculator.precision);
    println!("{} = {display}", ev.expression.trim());
    record(store, cfg, HistoryEntry::new(ev.expression.trim(), display));

    // Plain arithmetic has nothing to explain.
    if ev.expression.chars().any(|c| c.is_ascii_alphabetic()) {
        if let Some(explanation) = explainer.explain_formula(&ev.expression) {
            print_explanation(&explanation);
        }
    }
    Ok(())
}

fn print_explanation(e: &qcalc_core::Explanation) {
    println!();
    println!("{}", e.function_name);
    println!("  Formula:     {}", e.display_formula());
    println!("  {}", e.description);
    if let Some(params) = &e.parameters {
        for p in params {
            println!("  - {}: {}", p.param, p.description);
        }
    }
    if !e.example.is_empty() {
        println!("  Example:     {}", e.example);
    }
}

/// What a single keypad token does.
#[derive(Debug, PartialEq)]
enum KeyPress<'a> {
    Input(&'a str),
    Function(&'a str),
    Operator(&'a str),
    Equals,
    Clear,
    Backspace,
    Second,
    Memory(MemoryKey),
}

fn classify_key(token: &str) -> KeyPress<'_> {
    match token {
        "=" => KeyPress::Equals,
        "C" | "AC" => KeyPress::Clear,
        "DEL" | "⌫" => KeyPress::Backspace,
        "2nd" => KeyPress::Second,
        "+" | "-" | "−" | "*" | "×" | "/" | "÷" | "^" | "%" => KeyPress::Operator(token),
        t if t.ends_with('(') => KeyPress::Function(t),
        t => match t.parse::<MemoryKey>() {
            Ok(key) => KeyPress::Memory(key),
            Err(_) => KeyPress::Input(t),
        },
    }
}

fn press(keypad: &mut Keypad, token: &str) -> Option<CalcResult<HistoryEntry>> {
    match classify_key(token) {
        KeyPress::Input(t) => keypad.input(t),
        KeyPress::Function(t) => keypad.function(t),
        KeyPress::Operator(t) => keypad.operator(t),
        KeyPress::Equals => return Some(keypad.calculate()),
        KeyPress::Clear => keypad.clear(),
        KeyPress::Backspace => keypad.backspace(),
        KeyPress::Second => keypad.toggle_second(),
        KeyPress::Memory(key) => keypad.memory(key),
    }
    None
}

fn cmd_keys(
    store: &dyn KeyValueStore,
    cfg: &Config,
    keys: &[String],
    angle: Option<AngleMode>,
) -> Result<()> {
    let mut keypad = keypad_for(cfg, angle);
    for token in keys {
        match press(&mut keypad, token) {
            Some(Ok(entry)) => record(store, cfg, entry),
            Some(Err(e)) => tracing::debug!("key {token}: {e}"),
            None => {}
        }
    }
    println!("{}", keypad.expression);
    match &keypad.error {
        Some(err) => println!("{err}"),
        None => println!("{}", keypad.current_input),
    }
    if let Some(m) = keypad.memory {
        println!("M = {}", format_number(m, cfg.calculator.precision));
    }
    Ok(())
}

fn cmd_history(store: &SqliteStore, cfg: &Config, action: HistoryAction) -> Result<()> {
    let mut history = load_history(store, cfg.history.limit);
    match action {
        HistoryAction::List { favorites } => {
            let entries: Vec<&HistoryEntry> = history
                .entries()
                .iter()
                .filter(|e| !favorites || e.is_favorite)
                .collect();
            if entries.is_empty() {
                println!("No history.");
            }
            for e in entries {
                print_entry(e);
            }
        }
        HistoryAction::Search { term } => {
            let found = history.filtered(&term);
            if found.is_empty() {
                println!("No matches for '{term}'.");
            }
            for e in found {
                print_entry(e);
            }
        }
        HistoryAction::Fav { timestamp } => {
            if history.toggle_favorite(&timestamp) == 0 {
                bail!("no history entry at {timestamp}");
            }
            save_history(store, &history)?;
            if let Some(e) = history.find(&timestamp) {
                print_entry(e);
            }
        }
        HistoryAction::Clear => {
            let n = history.len();
            history.clear();
            save_history(store, &history)?;
            println!("Cleared {n} entries.");
        }
        HistoryAction::Export { format, output } => {
            let text = match format {
                ExportFormat::Json => history.to_json()?,
                ExportFormat::Csv => history.to_csv(),
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Exported {} entries to {}", history.len(), path.display());
                }
                None => println!("{text}"),
            }
        }
        HistoryAction::Load { timestamp } => {
            let Some(entry) = history.find(&timestamp).cloned() else {
                bail!("no history entry at {timestamp}");
            };
            let mut keypad = keypad_for(cfg, None);
            keypad.load(&entry);
            let result = keypad.calculate()?;
            println!("{} = {}", result.expression, result.result);
        }
    }
    Ok(())
}

fn print_entry(e: &HistoryEntry) {
    let star = if e.is_favorite { "★" } else { " " };
    println!("{star} {}  {} = {}", e.timestamp, e.expression, e.result);
}

// ---------------------------------------------------------------------------
// Graphing and statistics
// ---------------------------------------------------------------------------

/// Read a data file, or stdin when no file is given.
fn read_data(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => {
            std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn bar(value: f64, max: f64, width: usize) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    "█".repeat(((value / max) * width as f64).round() as usize)
}

fn print_points(points: &[Point], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(points)?);
    } else {
        for p in points {
            println!("{:>12}  {:>14}", format_number(p.x, 6), format_number(p.y, 8));
        }
    }
    Ok(())
}

fn cmd_graph(store: &SqliteStore, cfg: &Config, chart: GraphCommand) -> Result<()> {
    let chart_type = match &chart {
        GraphCommand::Function { .. } => ChartType::Function,
        GraphCommand::Scatter { .. } => ChartType::Scatter,
        GraphCommand::Bar { .. } => ChartType::Bar,
        GraphCommand::Histogram { .. } => ChartType::Histogram,
        GraphCommand::Pie { .. } => ChartType::Pie,
    };
    prefs::save_chart_type(store, chart_type)?;

    match chart {
        GraphCommand::Function {
            expression,
            x_min,
            x_max,
            angle,
            json,
        } => {
            let (min, max) = graphing::parse_range(&x_min, &x_max)?;
            let points = graphing::plot_function(&expression, min, max, &evaluator_for(cfg, angle))?;
            if !json {
                println!("y = {expression}, {} points", points.len());
            }
            print_points(&points, json)?;
        }
        GraphCommand::Scatter { file, json } => {
            let points = graphing::parse_scatter(&read_data(file)?)?;
            print_points(&points, json)?;
        }
        GraphCommand::Bar { file, json } => {
            let data = graphing::parse_labeled(&read_data(file)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                let max = data.iter().map(|d| d.value).fold(0.0, f64::max);
                for d in &data {
                    println!("{:<16} {:>10}  {}", d.label, format_number(d.value, 8), bar(d.value, max, 40));
                }
            }
        }
        GraphCommand::Histogram { file, bins, json } => {
            let values = stats::parse_numbers(&read_data(file)?)?;
            let bins = graphing::histogram(&values, bins)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&bins)?);
            } else {
                let max = bins.iter().map(|b| b.count).max().unwrap_or(0) as f64;
                for b in &bins {
                    println!("{:<20} {:>5}  {}", b.label, b.count, bar(b.count as f64, max, 40));
                }
            }
        }
        GraphCommand::Pie { file, json } => {
            let slices = graphing::pie_slices(&graphing::parse_labeled(&read_data(file)?)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&slices)?);
            } else {
                for s in &slices {
                    println!("{:<16} {:>10}  {:>6.2}%  {}", s.label, format_number(s.value, 8), s.percent, bar(s.percent, 100.0, 40));
                }
            }
        }
    }
    Ok(())
}

fn cmd_stats(action: StatsCommand) -> Result<()> {
    match action {
        StatsCommand::Summary { data } => {
            let s = stats::summary(&stats::parse_numbers(&data.join(" "))?)?;
            println!("Count:    {}", s.count);
            println!("Sum:      {}", format_number(s.sum, 10));
            println!("Mean:     {}", format_number(s.mean, 10));
            println!("Median:   {}", format_number(s.median, 10));
            println!("Mode:     {}", s.mode_text());
            println!("Std dev:  {}", format_number(s.std_dev, 10));
            println!("Variance: {}", format_number(s.variance, 10));
            println!("Min:      {}", format_number(s.min, 10));
            println!("Max:      {}", format_number(s.max, 10));
            println!("Range:    {}", format_number(s.range, 10));
            println!("Q1:       {}", format_number(s.q1, 10));
            println!("Q3:       {}", format_number(s.q3, 10));
            println!("IQR:      {}", format_number(s.iqr, 10));
        }
        StatsCommand::Deviation { data } => {
            let d = stats::standard_deviation(&stats::parse_numbers(&data.join(" "))?)?;
            println!("Population σ:  {:.4}", d.population);
            println!("Sample s:      {:.4}", d.sample);
            println!("Population σ²: {:.4}", d.population_variance);
            println!("Sample s²:     {:.4}", d.sample_variance);
        }
        StatsCommand::Polygon { data, bins } => {
            let values = stats::parse_numbers(&data.join(" "))?;
            print_points(&stats::frequency_polygon(&values, bins)?, false)?;
        }
        StatsCommand::Interval {
            mean,
            std_dev,
            n,
            level,
        } => {
            let ci = stats::confidence_interval(mean, std_dev, n, level)?;
            println!("{level}% CI: {:.4} to {:.4}", ci.lower, ci.upper);
            println!("Margin of error: ±{:.4} (z = {})", ci.margin, ci.z);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Math tools
// ---------------------------------------------------------------------------

fn cmd_matrix(
    op: CliMatrixOp,
    a: Option<String>,
    b: Option<String>,
    random: Option<u8>,
) -> Result<()> {
    let binary = op.is_binary();
    let (a, b) = match random {
        Some(n) => {
            let mut rng = rand::thread_rng();
            let a = Matrix::random(n as usize, &mut rng);
            let b = binary.then(|| Matrix::random(n as usize, &mut rng));
            (a, b)
        }
        None => {
            let Some(a) = a else {
                bail!("matrix A is required (or use --random)");
            };
            let b = match b {
                Some(text) => Some(Matrix::parse(&text)?),
                None => None,
            };
            (Matrix::parse(&a)?, b)
        }
    };
    println!("A =\n{a}");
    if let (true, Some(b)) = (binary, &b) {
        println!("B =\n{b}");
    }
    let result = matrix::apply(op.into(), &a, b.as_ref())?;
    println!("Result =\n{result}");
    Ok(())
}

fn cmd_solve(input: &str) -> Result<()> {
    let solution = equation::solve(input)?;
    let d = solution.details;
    match d.kind {
        equation::EquationKind::Linear => {
            println!("Linear: {}x + {} = 0", d.a, d.b);
        }
        equation::EquationKind::Quadratic => {
            println!("Quadratic: {}x² + {}x + {} = 0", d.a, d.b, d.c);
            if let Some(disc) = d.discriminant {
                println!("Discriminant: {disc}");
            }
        }
    }
    for (i, root) in solution.roots.iter().enumerate() {
        println!("x{} = {root}", i + 1);
    }
    Ok(())
}

fn parse_fraction(text: &str) -> Result<Fraction> {
    let (num, den) = text.split_once('/').unwrap_or((text, "1"));
    let num: i64 = num.trim().parse().with_context(|| format!("invalid numerator in '{text}'"))?;
    let den: i64 = den.trim().parse().with_context(|| format!("invalid denominator in '{text}'"))?;
    Ok(Fraction::new(num, den)?)
}

fn cmd_tool(tool: ToolCommand) -> Result<()> {
    match tool {
        ToolCommand::Gcd { numbers } => {
            let r = numbers::gcd_lcm(&numbers.join(" "))?;
            println!("GCF: {}", r.gcd);
            println!("LCM: {}", r.lcm);
        }
        ToolCommand::Factor { n } => {
            let factors = numbers::prime_factors(n)?;
            let tag = if numbers::is_prime(n) { " (prime)" } else { "" };
            println!("{n} = {}{tag}", numbers::format_factors(&factors));
        }
        ToolCommand::Primes { limit } => {
            let primes = numbers::primes_up_to(limit);
            let list: Vec<String> = primes.iter().map(|p| p.to_string()).collect();
            println!("{} primes up to {limit}:", primes.len());
            println!("{}", list.join(", "));
        }
        ToolCommand::Fraction { a, op, b } => {
            let r = numbers::fraction_op(parse_fraction(&a)?, op, parse_fraction(&b)?)?;
            println!("{r}  ({})", format_number(r.to_f64(), 10));
        }
        ToolCommand::Perm { n, k } => match numbers::permutations(n, k) {
            Some(v) => println!("P({n}, {k}) = {v}"),
            None => bail!("k must not exceed n, and the result must fit"),
        },
        ToolCommand::Comb { n, k } => match numbers::combinations(n, k) {
            Some(v) => println!("C({n}, {k}) = {v}"),
            None => bail!("k must not exceed n, and the result must fit"),
        },
        ToolCommand::Round { value, decimals } => {
            println!("{}", numbers::round_to(value, decimals));
        }
        ToolCommand::Power { base, exponent } => {
            println!("{}", format_number(numbers::power(base, exponent)?, 10));
        }
        ToolCommand::Root { value, n } => {
            println!("{}", format_number(numbers::nth_root(value, n)?, 10));
        }
        ToolCommand::Log { value, base } => {
            println!("{}", format_number(numbers::log_base(value, base)?, 10));
        }
        ToolCommand::Ratio { a, b, c, d } => {
            let r = numbers::solve_ratio(a, b, c, d)?;
            println!(
                "{} : {} = {} : {}",
                format_number(r.a, 10),
                format_number(r.b, 10),
                format_number(r.c, 10),
                format_number(r.d, 10)
            );
        }
        ToolCommand::Percent { mode, x, y } => {
            let line = match mode {
                PercentMode::Of => format!("{x}% of {y} = {}", format_number(numbers::percent_of(x, y), 10)),
                PercentMode::WhatPercent => {
                    format!("{x} is {}% of {y}", format_number(numbers::what_percent(x, y)?, 10))
                }
                PercentMode::Whole => {
                    format!("{x} is {y}% of {}", format_number(numbers::percent_whole(x, y)?, 10))
                }
            };
            println!("{line}");
        }
        ToolCommand::Random { min, max, count } => {
            let values = numbers::random_integers(&mut rand::thread_rng(), min, max, count)?;
            let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            println!("{}", list.join(", "));
        }
        ToolCommand::Triangle { a, b, c } => {
            let t = geometry::triangle(a, b, c)?;
            println!("Perimeter: {:.4}", t.perimeter);
            println!("Area:      {:.4}", t.area);
            println!("Angles:    A={:.2}°  B={:.2}°  C={:.2}°", t.angle_a, t.angle_b, t.angle_c);
        }
        ToolCommand::Circle { known, value } => {
            let c = geometry::circle(known.into(), value)?;
            println!("Radius:        {:.4}", c.radius);
            println!("Diameter:      {:.4}", c.diameter);
            println!("Circumference: {:.4}", c.circumference);
            println!("Area:          {:.4}", c.area);
        }
        ToolCommand::Pythagoras { solve, a, b, c } => {
            let side = match solve {
                CliSide::A => "a",
                CliSide::B => "b",
                CliSide::C => "c",
            };
            let v = geometry::pythagorean(solve.into(), a, b, c)?;
            println!("{side} = {:.4}", v);
        }
        ToolCommand::Distance { x1, y1, x2, y2 } => {
            println!("{:.4}", geometry::distance((x1, y1), (x2, y2)));
        }
        ToolCommand::Area { shape, dims } => {
            let shape = match (shape, dims.as_slice()) {
                (CliShape::Rectangle, [width, height]) => Shape::Rectangle {
                    width: *width,
                    height: *height,
                },
                (CliShape::Triangle, [base, height]) => Shape::Triangle {
                    base: *base,
                    height: *height,
                },
                (CliShape::Circle, [radius]) => Shape::Circle { radius: *radius },
                _ => bail!("rectangle and triangle take two dimensions, circle takes one"),
            };
            println!("{:.4}", geometry::area(shape));
        }
        ToolCommand::Constants => {
            for c in SCIENTIFIC_CONSTANTS {
                println!("{:<24} {:<4} {:<18e} {}", c.name, c.symbol, c.value, c.unit);
            }
        }
    }
    Ok(())
}

fn cmd_units(
    category: Option<UnitCategory>,
    value: Option<f64>,
    from: Option<String>,
    to: Option<String>,
    list: bool,
) -> Result<()> {
    if list || category.is_none() {
        for cat in UnitCategory::ALL {
            if category.is_some_and(|c| c != cat) {
                continue;
            }
            println!("{cat}: {}", cat.units().join(", "));
        }
        return Ok(());
    }
    let (Some(category), Some(value), Some(from), Some(to)) = (category, value, from, to) else {
        bail!("usage: qcalc units <category> <value> <from> <to>");
    };
    let result = convert::convert_units(category, value, &from, &to)?;
    println!("{value} {from} = {} {to}", to_precision(result, UNIT_PRECISION));
    Ok(())
}

fn cmd_base(value: &str, from: NumberBase) -> Result<()> {
    let values = convert::convert_base(value, from)?;
    for base in [NumberBase::Bin, NumberBase::Oct, NumberBase::Dec, NumberBase::Hex] {
        println!("{:<12} {}", base.name(), values.get(base));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Resolve the pair against the last-used one and remember the result.
fn currency_pair(
    store: &dyn KeyValueStore,
    from: Option<String>,
    to: Option<String>,
) -> (String, String) {
    let (saved_from, saved_to) = currency::load_pair(store);
    let from = from.map(|c| c.to_uppercase()).unwrap_or(saved_from);
    let to = to.map(|c| c.to_uppercase()).unwrap_or(saved_to);
    currency::save_pair(store, &from, &to);
    (from, to)
}

fn currency_label(code: &str) -> String {
    match currency::currency_name(code) {
        Some(name) => format!("{code} ({name})"),
        None => code.to_string(),
    }
}

fn cmd_currency(
    store: &SqliteStore,
    cfg: &Config,
    explainer: &dyn Explainer,
    action: CurrencyCommand,
) -> Result<()> {
    match action {
        CurrencyCommand::Convert {
            amount,
            from,
            to,
            reverse,
        } => {
            let (from, to) = currency_pair(store, from, to);
            let snapshot = rates_client(cfg).latest()?;
            if reverse {
                let cost = currency::convert_reverse(&snapshot, amount, &from, &to)?;
                println!("{amount:.2} {} costs {cost:.2} {}", currency_label(&to), currency_label(&from));
            } else {
                let result = currency::convert(&snapshot, amount, &from, &to)?;
                println!("{amount:.2} {} = {result:.2} {}", currency_label(&from), currency_label(&to));
            }
            println!("{}", currency::rate_text(&snapshot, &from, &to));
            if !snapshot.time_last_update_utc.is_empty() {
                println!("Updated: {}", snapshot.time_last_update_utc);
            }
        }
        CurrencyCommand::Rates { base } => {
            let base = base.to_uppercase();
            let snapshot = rates_client(cfg).latest()?;
            for code in snapshot.sorted_codes() {
                if let Ok(rate) = currency::exchange_rate(&snapshot, &base, code) {
                    println!("{code}  {rate:>14.4}");
                }
            }
        }
        CurrencyCommand::History { from, to, days } => {
            let (from, to) = currency_pair(store, from, to);
            let days = days.unwrap_or(cfg.currency.history_days);
            let (start, end) = currency::history_window(Local::now().date_naive(), days);
            let points = rates_client(cfg).history(&from, &to, start, end)?;
            let max = points.iter().map(|p| p.rate).fold(0.0, f64::max);
            println!("{from} → {to}, {start} to {end}");
            for p in &points {
                println!("{}  {:>10.4}  {}", p.date, p.rate, bar(p.rate, max, 30));
            }
        }
        CurrencyCommand::Insight { from, to } => {
            let (from, to) = currency_pair(store, from, to);
            println!("{}", explainer.currency_narrative(&from, &to));
        }
        CurrencyCommand::List => {
            for (code, name) in currency::CURRENCY_NAMES {
                println!("{code}  {name}");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Finance
// ---------------------------------------------------------------------------

fn money(v: f64) -> String {
    format!("{v:.2}")
}

fn cmd_finance(explainer: &dyn Explainer, calc: FinanceCommand) -> Result<()> {
    match calc {
        FinanceCommand::Loan {
            amount,
            rate,
            years,
        } => {
            let loan = financial::loan(amount, rate, years)?;
            println!("Monthly payment: {}", money(loan.monthly_payment));
            println!("Total paid:      {}", money(loan.total_paid));
            println!("Total interest:  {}", money(loan.total_interest));
            println!();
            println!("{:>4}  {:>14}  {:>14}  {:>14}", "Year", "Principal", "Interest", "Balance");
            for row in loan.yearly.iter().skip(1) {
                println!(
                    "{:>4}  {:>14}  {:>14}  {:>14}",
                    row.year,
                    money(row.principal_paid),
                    money(row.interest_paid),
                    money(row.balance)
                );
            }
        }
        FinanceCommand::Amortize {
            amount,
            rate,
            years,
        } => {
            let a = financial::amortization_schedule(amount, rate, years)?;
            println!("Monthly payment: {}", money(a.monthly_payment));
            println!("{:>5}  {:>12}  {:>12}  {:>12}  {:>14}", "Month", "Payment", "Principal", "Interest", "Balance");
            for row in &a.schedule {
                println!(
                    "{:>5}  {:>12}  {:>12}  {:>12}  {:>14}",
                    row.month,
                    money(row.payment),
                    money(row.principal),
                    money(row.interest),
                    money(row.balance)
                );
            }
            println!("Total interest:  {}", money(a.total_interest));
        }
        FinanceCommand::Rate {
            principal,
            payment,
            years,
        } => {
            let r = financial::solve_interest_rate(principal, payment, years)?;
            println!("APR:            {:.3}%", r.apr);
            println!("Total paid:     {}", money(r.total_paid));
            println!("Total interest: {}", money(r.total_interest));
        }
        FinanceCommand::Mortgage {
            price,
            down,
            rate,
            years,
            tax,
            insurance,
            pmi,
        } => {
            let m = financial::mortgage(&MortgageInput {
                home_price: price,
                down_payment: down,
                years,
                annual_rate_percent: rate,
                annual_tax: tax,
                annual_insurance: insurance,
                pmi_rate_percent: pmi,
            })?;
            println!("Loan amount:        {} ({:.1}% down)", money(m.loan_amount), financial::down_payment_percent(price, down));
            println!("Principal+interest: {}", money(m.monthly_principal_interest));
            println!("Property tax:       {}", money(m.monthly_tax));
            println!("Insurance:          {}", money(m.monthly_insurance));
            println!("PMI:                {}", money(m.monthly_pmi));
            println!("Total monthly:      {}", money(m.total_monthly));
            println!("Total interest:     {}", money(m.total_interest));
            println!();
            for y in &m.yearly {
                println!(
                    "Year {:>2}: balance {:>14}  interest {:>14}  principal {:>14}",
                    y.year,
                    money(y.balance),
                    money(y.interest_total),
                    money(y.principal_total)
                );
            }
        }
        FinanceCommand::Auto {
            price,
            down,
            trade_in,
            fees,
            sales_tax,
            rate,
            years,
            analyze,
        } => {
            let input = AutoLoanInput {
                vehicle_price: price,
                down_payment: down,
                trade_in,
                fees,
                sales_tax_percent: sales_tax,
                annual_rate_percent: rate,
                years,
            };
            let auto = financial::auto_loan(&input)?;
            println!("Loan amount:     {}", money(auto.loan_amount));
            println!("Sales tax:       {}", money(auto.tax_amount));
            println!("Monthly payment: {}", money(auto.monthly_payment));
            println!("Total paid:      {}", money(auto.total_paid));
            println!("Total interest:  {}", money(auto.total_interest));
            if analyze {
                println!();
                println!("{}", explainer.auto_loan_narrative(&input.details(auto.loan_amount)));
            }
        }
        FinanceCommand::Invest {
            principal,
            contribution,
            rate,
            years,
            frequency,
        } => {
            let g = financial::investment(principal, contribution, rate, years, frequency)?;
            print_growth(&g, "Year");
        }
        FinanceCommand::Retire {
            age,
            retire_at,
            savings,
            monthly,
            rate,
        } => {
            let g = financial::retirement(age, retire_at, savings, monthly, rate)?;
            print_growth(&g, "Age");
        }
        FinanceCommand::Simple {
            principal,
            rate,
            time,
            unit,
        } => {
            let s = financial::simple_interest(principal, rate, time, unit.into())?;
            println!("Interest: {}", money(s.interest));
            println!("Total:    {}", money(s.total));
        }
        FinanceCommand::Solve {
            amount,
            rate,
            term,
            payment,
        } => match financial::solve_payment_unknown(amount, rate, term, payment)? {
            PaymentUnknown::Payment(v) => println!("Monthly payment: {}", money(v)),
            PaymentUnknown::Amount(v) => println!("Loan amount: {}", money(v)),
            PaymentUnknown::TermYears(v) => println!("Term: {v:.2} years"),
        },
        FinanceCommand::Inflation {
            amount,
            rate,
            years,
            past,
        } => {
            let mode = if past {
                InflationMode::Past
            } else {
                InflationMode::Future
            };
            let r = financial::inflation(amount, rate, years, mode);
            match mode {
                InflationMode::Future => println!("{} today costs {} in {years} years", money(amount), money(r.value)),
                InflationMode::Past => println!("{} today was worth {} {years} years ago", money(amount), money(r.value)),
            }
            println!("Change: {}", money(r.change));
        }
        FinanceCommand::Tax { income, status } => {
            let t = financial::income_tax(income, status.into())?;
            println!("Taxable income: {}", money(t.taxable_income));
            println!("Total tax:      {}", money(t.total_tax));
            println!("Effective rate: {:.2}%", t.effective_rate);
            println!("Marginal rate:  {:.0}%", t.marginal_rate);
            for band in &t.breakdown {
                let to = band.to.map(money).unwrap_or_else(|| "and up".into());
                println!("  {:>4.0}%  {} - {}: {}", band.rate_percent, money(band.from), to, money(band.tax));
            }
        }
        FinanceCommand::Sales {
            price,
            rate,
            reverse,
        } => {
            let s = if reverse {
                financial::reverse_sales_tax(price, rate)
            } else {
                financial::sales_tax(price, rate)
            };
            println!("Net:   {}", money(s.net));
            println!("Tax:   {}", money(s.tax));
            println!("Gross: {}", money(s.gross));
        }
    }
    Ok(())
}

fn print_growth(g: &financial::Growth, label: &str) {
    println!("Future value:        {}", money(g.future_value));
    println!("Total contributions: {}", money(g.total_contributions));
    println!("Total interest:      {}", money(g.total_interest));
    println!();
    println!("{label:>4}  {:>14}  {:>14}  {:>14}", "Principal", "Contributions", "Interest");
    for row in &g.yearly {
        println!(
            "{:>4}  {:>14}  {:>14}  {:>14}",
            row.year,
            money(row.principal),
            money(row.contributions),
            money(row.interest)
        );
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

fn cmd_date(action: DateCommand) -> Result<()> {
    match action {
        DateCommand::Diff { start, end } => {
            let (start, end) = (parse_date(&start)?, parse_date(&end)?);
            let Some(d) = date::duration(start, end) else {
                bail!("end date must not be before start date");
            };
            println!("{} years, {} months, {} days", d.years, d.months, d.days);
            println!("Total: {} days", d.total_days);
        }
        DateCommand::Add {
            date,
            years,
            months,
            days,
            subtract,
        } => {
            let base = parse_date(&date)?;
            let sign = if subtract { -1 } else { 1 };
            let result = date::add_to_date(base, sign * years, sign * months, sign as i64 * days)?;
            println!("{}", date::format_long(result));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Height in cm; imperial heights may be split into feet and inches.
fn height_cm(units: UnitSystem, height: f64, feet: Option<f64>) -> f64 {
    match (units, feet) {
        (UnitSystem::Imperial, Some(ft)) => health::feet_inches_to_cm(ft, height),
        _ => units.length_to_cm(height),
    }
}

/// `h:mm:ss`, `m:ss` or plain seconds.
fn parse_clock(text: &str) -> Result<f64> {
    let mut total = 0.0;
    for part in text.trim().split(':') {
        let v: f64 = part
            .trim()
            .parse()
            .with_context(|| format!("invalid time '{text}'"))?;
        total = total * 60.0 + v;
    }
    Ok(total)
}

fn cmd_health(units: UnitSystem, calc: HealthCommand) -> Result<()> {
    match calc {
        HealthCommand::Bmi {
            weight,
            height,
            feet,
        } => {
            let b = health::bmi(units.weight_to_kg(weight), height_cm(units, height, feet))?;
            println!("BMI: {:.1} ({})", b.value, b.category);
        }
        HealthCommand::BodyFat {
            gender,
            height,
            waist,
            neck,
            hip,
        } => {
            let bf = health::body_fat_navy(
                gender,
                units.length_to_cm(height),
                units.length_to_cm(waist),
                units.length_to_cm(neck),
                hip.map(|h| units.length_to_cm(h)),
            )?;
            println!("Body fat: {bf:.1}%");
        }
        HealthCommand::Ideal {
            gender,
            height,
            feet,
        } => {
            let w = health::ideal_weight(gender, height_cm(units, height, feet))?;
            for f in &w.formulas {
                println!("{:<22} {}", f.label, weight_text(f.value, units));
            }
            println!(
                "Healthy BMI range:      {}",
                health::format_weight_range(w.healthy_bmi_min_kg, w.healthy_bmi_max_kg, units)
            );
            println!(
                "Formula range:          {}",
                health::format_weight_range(w.formula_min_kg, w.formula_max_kg, units)
            );
        }
        HealthCommand::HeartRate { age } => {
            let (max, zones) = health::heart_rate_zones(age)?;
            println!("Max heart rate: {max} bpm");
            for z in &zones {
                println!(
                    "{:<20} {:>3}-{:<3}%  {:>3}-{:<3} bpm",
                    z.name, z.low_percent, z.high_percent, z.low_bpm, z.high_bpm
                );
            }
        }
        HealthCommand::Calories {
            gender,
            age,
            weight,
            height,
            activity,
            goal,
            plan,
        } => {
            let c = health::calories(
                gender,
                age,
                units.weight_to_kg(weight),
                units.length_to_cm(height),
                activity,
            )?;
            println!("BMR:         {} kcal", c.bmr);
            println!("Maintenance: {} kcal", c.maintenance);
            println!("Mild loss:   {} kcal", c.mild_loss);
            println!("Loss:        {} kcal", c.loss);
            println!("Mild gain:   {} kcal", c.mild_gain);
            println!("Gain:        {} kcal", c.gain);
            let target = c.target(goal);
            let m = health::macros(target, plan);
            println!();
            println!("Macros at {target} kcal: protein {} g, carbs {} g, fat {} g", m.protein_g, m.carbs_g, m.fat_g);
        }
        HealthCommand::Pace {
            distance,
            time,
            pace,
        } => {
            let time = time.as_deref().map(parse_clock).transpose()?;
            let pace = pace.as_deref().map(parse_clock).transpose()?;
            println!("{}", health::pace(distance, time, pace)?.describe(units));
        }
        HealthCommand::Lbm { weight, body_fat } => {
            let l = health::lean_body_mass(weight, body_fat)?;
            let unit = match units {
                UnitSystem::Metric => "kg",
                UnitSystem::Imperial => "lbs",
            };
            println!("Lean mass: {:.1} {unit}", l.lean_mass);
            println!("Fat mass:  {:.1} {unit}", l.fat_mass);
        }
        HealthCommand::Water { weight, exercise } => {
            let w = health::water_intake(units.weight_to_kg(weight), exercise)?;
            println!("{:.0} oz ({:.1} L, about {:.0} glasses)", w.ounces, w.liters, w.glasses);
        }
        HealthCommand::Pregnancy { date, conception } => {
            let method = if conception {
                PregnancyMethod::Conception
            } else {
                PregnancyMethod::LastPeriod
            };
            let p = health::pregnancy(method, parse_date(&date)?, today());
            println!("Due date:  {}", date::format_long(p.due_date));
            println!("Progress:  {} weeks, {} days", p.weeks, p.days);
            println!("Trimester: {}", p.trimester);
        }
        HealthCommand::Bac {
            gender,
            weight,
            drinks,
            hours,
        } => {
            let b = health::bac(gender, units.weight_to_kg(weight), drinks, hours)?;
            println!("BAC: {:.3}% ({})", b.value, b.status);
        }
    }
    Ok(())
}

fn weight_text(kg: f64, units: UnitSystem) -> String {
    match units {
        UnitSystem::Metric => format!("{kg:.1} kg"),
        UnitSystem::Imperial => format!("{:.1} lbs", kg / units.weight_to_kg(1.0)),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

fn cmd_theme(store: &SqliteStore, theme: Option<Theme>, toggle: bool) -> Result<()> {
    let current = match (theme, toggle) {
        (_, true) => prefs::toggle_theme(store)?,
        (Some(t), false) => {
            prefs::save_theme(store, t)?;
            t
        }
        (None, false) => prefs::load_theme(store),
    };
    println!("Theme: {current}");
    Ok(())
}

fn cmd_config(cfg: &Config) -> Result<()> {
    println!("Config: {}", config::show_config_path());
    println!();
    println!("[store]");
    println!(
        "  path = {}",
        cfg.store
            .path
            .as_deref()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (default)", default_db_path().display()))
    );
    println!();
    println!("[calculator]");
    println!("  angle_mode = {}", cfg.calculator.angle_mode);
    println!("  precision = {}", cfg.calculator.precision);
    println!();
    println!("[history]");
    println!("  limit = {}", cfg.history.limit);
    println!();
    println!("[currency]");
    println!("  rates_url = {}", cfg.currency.rates_url);
    println!("  history_url = {}", cfg.currency.history_url);
    println!("  history_days = {}", cfg.currency.history_days);
    println!("  timeout_secs = {}", cfg.currency.timeout_secs);
    println!();
    println!("[ai]");
    println!("  enabled = {}", cfg.ai.enabled);
    println!("  model = {}", cfg.ai.model);
    println!("  api_key_env = {}", cfg.ai.api_key_env);
    if let Some(ref url) = cfg.ai.base_url {
        println!("  base_url = {url}");
    }
    println!("  timeout_secs = {}", cfg.ai.timeout_secs);
    let key_state = if cfg.ai.api_key().is_some() {
        "set"
    } else {
        "not set"
    };
    println!("  api key: {key_state}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_key() {
        assert_eq!(classify_key("7"), KeyPress::Input("7"));
        assert_eq!(classify_key("π"), KeyPress::Input("π"));
        assert_eq!(classify_key("sin("), KeyPress::Function("sin("));
        assert_eq!(classify_key("("), KeyPress::Function("("));
        assert_eq!(classify_key("×"), KeyPress::Operator("×"));
        assert_eq!(classify_key(")"), KeyPress::Input(")"));
        assert_eq!(classify_key("="), KeyPress::Equals);
        assert_eq!(classify_key("DEL"), KeyPress::Backspace);
        assert_eq!(classify_key("M+"), KeyPress::Memory(MemoryKey::Add));
    }

    #[test]
    fn test_press_sequence() {
        let mut keypad = Keypad::new(Evaluator::new(AngleMode::Deg));
        let mut last = None;
        for token in ["1", "2", "+", "3", "="] {
            if let Some(r) = press(&mut keypad, token) {
                last = Some(r.unwrap());
            }
        }
        let entry = last.unwrap();
        assert_eq!(entry.result, "15");
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("1:00:00").unwrap(), 3600.0);
        assert_eq!(parse_clock("5:30").unwrap(), 330.0);
        assert_eq!(parse_clock("90").unwrap(), 90.0);
        assert!(parse_clock("1:xx").is_err());
    }

    #[test]
    fn test_parse_fraction() {
        let f = parse_fraction("2/4").unwrap();
        assert_eq!((f.num, f.den), (1, 2));
        assert_eq!(parse_fraction("3").unwrap().den, 1);
        assert!(parse_fraction("1/0").is_err());
    }

    #[test]
    fn test_height_cm_feet_and_inches() {
        let cm = height_cm(UnitSystem::Imperial, 10.0, Some(5.0));
        assert!((cm - 177.8).abs() < 1e-9);
        assert_eq!(height_cm(UnitSystem::Metric, 180.0, Some(5.0)), 180.0);
    }

    #[test]
    fn test_record_caps_history() {
        let store = SqliteStore::in_memory().unwrap();
        let mut cfg = Config::default();
        cfg.history.limit = 2;
        for i in 0..3 {
            record(&store, &cfg, HistoryEntry::new(format!("{i}+0"), i.to_string()));
        }
        let history = load_history(&store, cfg.history.limit);
        assert_eq!(history.len(), 2);
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> CalcResult<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> CalcResult<()> {
            Err(qcalc_core::CalcError::Storage("disk full".into()))
        }

        fn remove(&self, _key: &str) -> CalcResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_history_write_keeps_result() {
        let cfg = Config::default();
        record(&ReadOnlyStore, &cfg, HistoryEntry::new("1+1", "2"));
        cmd_eval(&ReadOnlyStore, &cfg, &DisabledExplainer, "1+1", None).unwrap();
        let keys: Vec<String> = ["2", "+", "3", "="].iter().map(|k| k.to_string()).collect();
        cmd_keys(&ReadOnlyStore, &cfg, &keys, None).unwrap();
    }

    #[test]
    fn test_keypad_uses_configured_precision() {
        let mut cfg = Config::default();
        cfg.calculator.precision = 4;
        let mut keypad = keypad_for(&cfg, None);
        for token in ["1", "÷", "3"] {
            press(&mut keypad, token);
        }
        let entry = keypad.calculate().unwrap();
        assert_eq!(entry.result, format_number(1.0 / 3.0, cfg.calculator.precision));
    }

    #[test]
    fn test_second_key_replays_inverse() {
        let mut keypad = Keypad::new(Evaluator::new(AngleMode::Deg));
        let mut last = None;
        for token in ["2nd", "sin(", "1", "="] {
            if let Some(r) = press(&mut keypad, token) {
                last = Some(r.unwrap());
            }
        }
        assert_eq!(last.unwrap().expression, "asin(1)");
    }

    #[test]
    fn test_currency_pair_persists() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(currency_pair(&store, None, None), ("USD".into(), "EUR".into()));
        currency_pair(&store, Some("gbp".into()), None);
        assert_eq!(currency_pair(&store, None, None), ("GBP".into(), "EUR".into()));
    }
}
