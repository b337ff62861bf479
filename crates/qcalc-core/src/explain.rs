//! Explanations of formulas and short narrative analyses, produced by a
//! generative model behind the [`Explainer`] trait.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const FALLBACK_NARRATIVE: &str =
    "Could not retrieve analysis at this time. Please try again later.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationParam {
    pub param: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub function_name: String,
    pub formula: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latex_formula: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ExplanationParam>>,
    pub example: String,
}

impl Explanation {
    /// Shown when the model could not be reached or answered garbage.
    pub fn fallback() -> Self {
        Self {
            function_name: "Error".into(),
            formula: "N/A".into(),
            latex_formula: None,
            description: "Could not fetch an explanation at this time. The AI service might be \
                          temporarily unavailable or the request could not be processed."
                .into(),
            parameters: None,
            example: "Please try again later.".into(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.function_name == "Error" && self.formula == "N/A"
    }

    /// Best formula text for a terminal: rendered LaTeX when present.
    pub fn display_formula(&self) -> String {
        match &self.latex_formula {
            Some(latex) if !latex.trim().is_empty() => render_latex(latex),
            _ => self.formula.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoLoanDetails {
    pub loan_amount: f64,
    pub interest_rate: f64,
    pub term_years: f64,
    pub vehicle_price: f64,
    pub down_payment: f64,
}

/// Source of explanations. Implementations never fail: transport or
/// decoding problems turn into [`Explanation::fallback`] or
/// [`FALLBACK_NARRATIVE`].
pub trait Explainer {
    /// `None` when the model found nothing worth explaining.
    fn explain_formula(&self, expression: &str) -> Option<Explanation>;
    fn currency_narrative(&self, from: &str, to: &str) -> String;
    fn auto_loan_narrative(&self, details: &AutoLoanDetails) -> String;
}

// ----- prompts -----

pub fn formula_prompt(expression: &str) -> String {
    format!(
        r#"Identify the most significant mathematical, statistical or financial function in the expression "{expression}".
Skip plain arithmetic and explain the main function (for example sqrt, sin, log, nCr, mean, pmt).

Answer with one JSON object:
{{
  "functionName": "Readable name, e.g. 'Square Root'",
  "formula": "Plain-text formula, e.g. 'sqrt(x)'",
  "latexFormula": "Short LaTeX form, e.g. '\\sqrt{{x}}'",
  "description": "One paragraph describing what the function computes.",
  "parameters": [{{ "param": "x", "description": "The radicand." }}],
  "example": "A small worked example, e.g. 'sqrt(16) = 4'."
}}

Conventions:
- List functions such as mean or std take 'x₁, x₂, ..., xₙ', described as a set of numbers, e.g. 'mean(2, 4, 9)'.
- pmt has the signature pmt(annualRate, termYears, principal); describe every argument.
- Use 'θ' for trigonometric arguments, 'log_b(x)' for logarithms and 'nCr(n, k)' for combinations.
- Return an empty parameters array for constants such as pi.
- Return null when there is no function to explain."#
    )
}

pub fn currency_prompt(from: &str, to: &str) -> String {
    format!(
        "Give a short, educational overview of the factors that usually move the {from}/{to} \
         exchange rate, such as central bank interest rate decisions, inflation figures and trade \
         balances. Do not give financial advice, do not forecast prices and avoid speculative \
         wording like \"will rise\" or \"will fall\". Stay under 60 words."
    )
}

pub fn auto_loan_prompt(d: &AutoLoanDetails) -> String {
    format!(
        "Review these auto loan figures and give a short educational analysis.\n\
         - Loan Amount: {:.2}\n\
         - Interest Rate (APR): {}%\n\
         - Loan Term: {} years\n\
         - Vehicle Price: {:.2}\n\
         - Down Payment: {:.2}\n\n\
         Comment on how the rate compares with typical market rates, what the down payment does to \
         the loan, or what extra payments could save.\n\
         Rules: no financial advice; use conditional wording (\"you could save\"), never promises; \
         keep an encouraging tone; stay under 100 words; open with one summary sentence followed by \
         2-3 bullet points.",
        d.loan_amount, d.interest_rate, d.term_years, d.vehicle_price, d.down_payment
    )
}

/// Response schema requested for formula explanations.
pub fn explanation_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "functionName": { "type": "STRING" },
            "formula": { "type": "STRING" },
            "latexFormula": { "type": "STRING" },
            "description": { "type": "STRING" },
            "parameters": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "param": { "type": "STRING" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["param", "description"]
                }
            },
            "example": { "type": "STRING" }
        },
        "required": ["functionName", "formula", "description", "example"]
    })
}

// ----- LaTeX -----

/// Render the small LaTeX subset used in explanations as plain text.
pub fn render_latex(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0;
    render_until(&chars, &mut pos, None)
}

fn render_until(chars: &[char], pos: &mut usize, stop: Option<char>) -> String {
    let mut out = String::new();
    while *pos < chars.len() {
        let c = chars[*pos];
        if Some(c) == stop {
            *pos += 1;
            return out;
        }
        match c {
            '\\' => {
                *pos += 1;
                out.push_str(&render_command(chars, pos));
            }
            '^' | '_' => {
                *pos += 1;
                let arg = read_argument(chars, pos);
                out.push(c);
                if arg.chars().count() > 1 {
                    out.push('(');
                    out.push_str(&arg);
                    out.push(')');
                } else {
                    out.push_str(&arg);
                }
            }
            '{' => {
                *pos += 1;
                out.push_str(&render_until(chars, pos, Some('}')));
            }
            _ => {
                out.push(c);
                *pos += 1;
            }
        }
    }
    out
}

fn read_command_name(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && chars[*pos].is_ascii_alphabetic() {
        *pos += 1;
    }
    if *pos == start && *pos < chars.len() {
        // Escaped single character such as `\{` or `\,`.
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn render_command(chars: &[char], pos: &mut usize) -> String {
    let name = read_command_name(chars, pos);
    match name.as_str() {
        "frac" => {
            let num = read_argument(chars, pos);
            let den = read_argument(chars, pos);
            format!("({num})/({den})")
        }
        "sqrt" => format!("√({})", read_argument(chars, pos)),
        "left" | "right" => String::new(),
        "," | ";" | " " => " ".into(),
        other => latex_symbol(other).map(str::to_string).unwrap_or(name),
    }
}

fn read_argument(chars: &[char], pos: &mut usize) -> String {
    while *pos < chars.len() && chars[*pos] == ' ' {
        *pos += 1;
    }
    match chars.get(*pos) {
        Some('{') => {
            *pos += 1;
            render_until(chars, pos, Some('}'))
        }
        Some('\\') => {
            *pos += 1;
            render_command(chars, pos)
        }
        Some(&c) => {
            *pos += 1;
            c.to_string()
        }
        None => String::new(),
    }
}

fn latex_symbol(name: &str) -> Option<&'static str> {
    Some(match name {
        "theta" => "θ",
        "pi" => "π",
        "phi" => "φ",
        "Delta" => "Δ",
        "pm" => "±",
        "times" => "×",
        "div" => "÷",
        "cdot" => "·",
        "sigma" => "σ",
        "mu" => "μ",
        "sum" => "Σ",
        "infty" => "∞",
        "le" | "leq" => "≤",
        "ge" | "geq" => "≥",
        "ln" => "ln",
        "log" => "log",
        "sin" => "sin",
        "cos" => "cos",
        "tan" => "tan",
        _ => return None,
    })
}

/// Placeholder used when no model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledExplainer;

impl Explainer for DisabledExplainer {
    fn explain_formula(&self, _expression: &str) -> Option<Explanation> {
        None
    }

    fn currency_narrative(&self, _from: &str, _to: &str) -> String {
        FALLBACK_NARRATIVE.into()
    }

    fn auto_loan_narrative(&self, _details: &AutoLoanDetails) -> String {
        FALLBACK_NARRATIVE.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_sqrt_and_frac() {
        assert_eq!(render_latex(r"\sqrt{x}"), "√(x)");
        assert_eq!(render_latex(r"\frac{n!}{k!(n-k)!}"), "(n!)/(k!(n-k)!)");
    }

    #[test]
    fn test_render_scripts() {
        assert_eq!(render_latex("x^2"), "x^2");
        assert_eq!(render_latex("e^{i\\pi}"), "e^(iπ)");
        assert_eq!(render_latex("\\log_b(x)"), "log_b(x)");
        assert_eq!(render_latex("x_{12}"), "x_(12)");
    }

    #[test]
    fn test_render_symbols() {
        assert_eq!(render_latex(r"\sin(\theta)"), "sin(θ)");
        assert_eq!(render_latex(r"a \pm b \times c \div d \cdot e"), "a ± b × c ÷ d · e");
        assert_eq!(render_latex(r"\Delta \phi"), "Δ φ");
        assert_eq!(render_latex(r"\left(x\right)"), "(x)");
    }

    #[test]
    fn test_render_nested() {
        assert_eq!(
            render_latex(r"\frac{-b \pm \sqrt{b^2-4ac}}{2a}"),
            "(-b ± √(b^2-4ac))/(2a)"
        );
    }

    #[test]
    fn test_fallback_shape() {
        let f = Explanation::fallback();
        assert!(f.is_fallback());
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["functionName"], "Error");
        assert_eq!(json["example"], "Please try again later.");
        assert!(json.get("latexFormula").is_none());
    }

    #[test]
    fn test_parse_explanation_json() {
        let raw = r#"{"functionName":"Square Root","formula":"sqrt(x)","latexFormula":"\\sqrt{x}",
            "description":"d","parameters":[{"param":"x","description":"radicand"}],"example":"sqrt(16) = 4"}"#;
        let e: Explanation = serde_json::from_str(raw).unwrap();
        assert_eq!(e.function_name, "Square Root");
        assert_eq!(e.display_formula(), "√(x)");
        assert_eq!(e.parameters.unwrap()[0].param, "x");
    }

    #[test]
    fn test_prompts_carry_inputs() {
        assert!(formula_prompt("sqrt(16)").contains("\"sqrt(16)\""));
        assert!(currency_prompt("USD", "EUR").contains("USD/EUR"));
        let p = auto_loan_prompt(&AutoLoanDetails {
            loan_amount: 20000.0,
            interest_rate: 6.5,
            term_years: 5.0,
            vehicle_price: 25000.0,
            down_payment: 5000.0,
        });
        assert!(p.contains("Loan Amount: 20000.00"));
        assert!(p.contains("6.5%"));
    }

    #[test]
    fn test_schema_requires_core_fields() {
        let s = explanation_schema();
        let req: Vec<&str> = s["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(req, vec!["functionName", "formula", "description", "example"]);
    }

    #[test]
    fn test_disabled_explainer() {
        let d = DisabledExplainer;
        assert!(d.explain_formula("sin(30)").is_none());
        assert_eq!(d.currency_narrative("USD", "EUR"), FALLBACK_NARRATIVE);
    }
}
