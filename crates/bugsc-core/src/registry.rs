//! The primitive/distribution/link-function registry (spec.md §6): a fixed set of
//! recognized names plus the extension hook ("callers may extend the set through a
//! registration hook that accepts a name and an arity").

use std::collections::BTreeMap;

/// Accepted argument count for a registered primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` arguments.
    Exact(usize),
    /// Any number of arguments.
    Variadic,
}

/// The fixed link-function table from spec.md §4.A/§6: `logit<->logistic`,
/// `log<->exp`, `cloglog<->cexpexp`, `probit<->phi`.
pub fn link_inverse(link: &str) -> Option<&'static str> {
    match link {
        "logit" => Some("logistic"),
        "log" => Some("exp"),
        "cloglog" => Some("cexpexp"),
        "probit" => Some("phi"),
        _ => None,
    }
}

/// Registry of function names recognized by the partial evaluator's folding step
/// (spec.md §4.B) and the node-function builder (§4.F), seeded with the fixed
/// primitive/math/distribution set from §6 and extensible before compilation.
#[derive(Debug, Clone)]
pub struct PrimitiveRegistry {
    arities: BTreeMap<String, Arity>,
    distributions: std::collections::BTreeSet<String>,
}

const ARITHMETIC: &[(&str, usize)] = &[
    ("+", 2),
    ("-", 2),
    ("*", 2),
    ("/", 2),
    ("^", 2),
    ("neg", 1),
];

const MATH: &[(&str, usize)] = &[
    ("log", 1),
    ("exp", 1),
    ("sqrt", 1),
    ("logistic", 1),
    ("cexpexp", 1),
    ("phi", 1),
    ("abs", 1),
    ("step", 1),
    ("mean", 1),
    ("sum", 1),
    ("max", 2),
    ("min", 2),
    ("pow", 2),
];

const DISTRIBUTIONS: &[&str] = &[
    "dnorm",
    "dbin",
    "dcat",
    "dgamma",
    "dbeta",
    "dunif",
    "dbern",
    "dpois",
    "dexp",
    "dflat",
    "dmnorm",
    "dwish",
];

impl Default for PrimitiveRegistry {
    fn default() -> Self {
        let mut arities = BTreeMap::new();
        for &(name, arity) in ARITHMETIC.iter().chain(MATH.iter()) {
            arities.insert(name.to_string(), Arity::Exact(arity));
        }
        for &name in DISTRIBUTIONS {
            arities.insert(name.to_string(), Arity::Variadic);
        }
        arities.insert(":".to_string(), Arity::Exact(2));
        arities.insert("getindex".to_string(), Arity::Variadic);
        arities.insert("truncated".to_string(), Arity::Exact(3));
        arities.insert("truncated_lower".to_string(), Arity::Exact(2));
        arities.insert("truncated_upper".to_string(), Arity::Exact(2));
        arities.insert("censored".to_string(), Arity::Exact(3));
        arities.insert("censored_lower".to_string(), Arity::Exact(2));
        arities.insert("censored_upper".to_string(), Arity::Exact(2));
        arities.insert("cdf".to_string(), Arity::Exact(2));
        arities.insert("pdf".to_string(), Arity::Exact(2));

        let distributions = DISTRIBUTIONS
            .iter()
            .map(|s| s.to_string())
            .chain([
                "truncated".to_string(),
                "truncated_lower".to_string(),
                "truncated_upper".to_string(),
                "censored".to_string(),
                "censored_lower".to_string(),
                "censored_upper".to_string(),
            ])
            .collect();

        Self {
            arities,
            distributions,
        }
    }
}

impl PrimitiveRegistry {
    /// Registers an additional function name and arity, visible to the partial
    /// evaluator and the node-function builder from then on. Per spec.md §6,
    /// registrations must happen before compilation.
    pub fn register(&mut self, name: impl Into<String>, arity: Arity) {
        self.arities.insert(name.into(), arity);
    }

    /// Registers an additional distribution constructor name.
    pub fn register_distribution(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.arities.insert(name.clone(), Arity::Variadic);
        self.distributions.insert(name);
    }

    /// True iff `name` is a recognized function (primitive, math, or distribution).
    pub fn is_known(&self, name: &str) -> bool {
        self.arities.contains_key(name)
    }

    /// True iff `name` is a recognized distribution constructor.
    pub fn is_distribution(&self, name: &str) -> bool {
        self.distributions.contains(name)
    }

    /// Returns the arity of a registered name, if any.
    pub fn arity_of(&self, name: &str) -> Option<Arity> {
        self.arities.get(name).copied()
    }

    /// Checks an argument count against a registered arity, for use by callers that
    /// want a clean bool rather than matching on [`Arity`] themselves.
    pub fn accepts(&self, name: &str, argc: usize) -> bool {
        match self.arities.get(name) {
            Some(Arity::Exact(n)) => *n == argc,
            Some(Arity::Variadic) => true,
            None => false,
        }
    }
}
