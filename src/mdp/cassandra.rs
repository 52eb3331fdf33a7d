//! Loader for Tony Cassandra's `.POMDP` / `.MDP` text format.
//!
//! Only the fully-observed part of a model is kept. Observation probabilities
//! (`O:` entries) and start distributions are skipped, and rewards may depend
//! on the observation only when the model has a single observation.
//!
//! Immediate rewards are folded over successor states:
//! `R(a, s) = sum over s' of T(a, s, s') * R(a, s, s')`.

use std::fs;
use std::path::Path;

use log::{debug, warn};
use ndarray::Array2;

use super::DenseMdp;
use crate::error::{Result, SolverError};

const SECTION_KEYWORDS: [&str; 9] = [
    "discount",
    "values",
    "states",
    "actions",
    "observations",
    "start",
    "T",
    "O",
    "R",
];

/// Reads and parses a Cassandra-format model file.
pub fn load_cassandra(path: impl AsRef<Path>) -> Result<DenseMdp> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    debug!("parsing {} ({} bytes)", path.display(), text.len());
    parse_cassandra(&text)
}

/// Parses a Cassandra-format model held in memory.
///
/// ```
/// use mdp_solvers::mdp::{parse_cassandra, MdpDescription};
///
/// let mdp = parse_cassandra(
///     "discount: 0.9\nvalues: reward\nstates: 2\nactions: stay go\n\
///      T: stay\nidentity\nT: go\n0 1\n1 0\nR: go : 0 : * : * 1.0\n",
/// )
/// .unwrap();
/// assert_eq!(mdp.num_actions(), 2);
/// assert_eq!(mdp.reward_transposed().entry(1, 0), 1.0);
/// ```
pub fn parse_cassandra(text: &str) -> Result<DenseMdp> {
    Parser::new(tokenize(text)).parse()
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    line: usize,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or("");
        for word in content.split_whitespace() {
            let mut rest = word;
            while let Some(colon) = rest.find(':') {
                if colon > 0 {
                    tokens.push(Token {
                        text: &rest[..colon],
                        line,
                    });
                }
                tokens.push(Token { text: ":", line });
                rest = &rest[colon + 1..];
            }
            if !rest.is_empty() {
                tokens.push(Token { text: rest, line });
            }
        }
    }
    tokens
}

/// Declared states, actions or observations.
#[derive(Debug, Clone, Default)]
struct Labels {
    count: usize,
    names: Vec<String>,
}

impl Labels {
    fn resolve(&self, token: &str) -> Option<usize> {
        if let Some(i) = self.names.iter().position(|n| n == token) {
            return Some(i);
        }
        token.parse::<usize>().ok().filter(|&i| i < self.count)
    }

    /// Indices selected by `token`, where `*` selects all of them.
    fn select(&self, token: &Token<'_>, what: &str) -> Result<Vec<usize>> {
        if token.text == "*" {
            return Ok((0..self.count).collect());
        }
        self.resolve(token.text)
            .map(|i| vec![i])
            .ok_or_else(|| SolverError::parse(token.line, format!("unknown {what} '{}'", token.text)))
    }
}

struct Model {
    transitions: Vec<Array2<f64>>,
    rewards: Vec<Array2<f64>>,
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    discount: Option<f64>,
    reward_sign: f64,
    states: Option<Labels>,
    actions: Option<Labels>,
    observations: Labels,
    model: Option<Model>,
    warned_observation_model: bool,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token<'a>>) -> Self {
        Self {
            tokens,
            pos: 0,
            discount: None,
            reward_sign: 1.0,
            states: None,
            actions: None,
            observations: Labels::default(),
            model: None,
            warned_observation_model: false,
        }
    }

    fn parse(mut self) -> Result<DenseMdp> {
        while let Some(token) = self.next() {
            match token.text {
                "discount" => {
                    self.expect_colon()?;
                    self.discount = Some(self.number()?);
                }
                "values" => {
                    self.expect_colon()?;
                    let kind = self.required("'reward' or 'cost'")?;
                    self.reward_sign = match kind.text {
                        "reward" => 1.0,
                        "cost" => -1.0,
                        other => {
                            return Err(SolverError::parse(
                                kind.line,
                                format!("expected 'reward' or 'cost', found '{other}'"),
                            ))
                        }
                    };
                }
                "states" => {
                    self.reject_after_entries(token)?;
                    self.expect_colon()?;
                    self.states = Some(self.labels(token.line)?);
                }
                "actions" => {
                    self.reject_after_entries(token)?;
                    self.expect_colon()?;
                    self.actions = Some(self.labels(token.line)?);
                }
                "observations" => {
                    self.expect_colon()?;
                    self.observations = self.labels(token.line)?;
                }
                "start" => {
                    warn!("line {}: ignoring start distribution", token.line);
                    self.skip_section();
                }
                "O" => {
                    if !self.warned_observation_model {
                        warn!("line {}: ignoring observation model", token.line);
                        self.warned_observation_model = true;
                    }
                    self.skip_section();
                }
                "T" => {
                    self.expect_colon()?;
                    self.transition_entry()?;
                }
                "R" => {
                    self.expect_colon()?;
                    self.reward_entry()?;
                }
                other => {
                    return Err(SolverError::parse(
                        token.line,
                        format!("unexpected token '{other}'"),
                    ))
                }
            }
        }
        self.finish()
    }

    fn finish(mut self) -> Result<DenseMdp> {
        let last_line = self.tokens.last().map_or(0, |t| t.line);
        let discount = self
            .discount
            .ok_or_else(|| SolverError::parse(last_line, "missing 'discount:' declaration"))?;
        let num_states = self.states.as_ref().map(|l| l.count).unwrap_or(0);
        let num_actions = self.actions.as_ref().map(|l| l.count).unwrap_or(0);
        self.ensure_model(last_line)?;
        let Model {
            transitions,
            rewards,
        } = self
            .model
            .take()
            .ok_or_else(|| SolverError::parse(last_line, "model was never declared"))?;

        let mut reward_t = Array2::<f64>::zeros((num_actions, num_states));
        for (a, (t, r)) in transitions.iter().zip(&rewards).enumerate() {
            for s in 0..num_states {
                let expected: f64 = t.row(s).iter().zip(r.row(s)).map(|(p, r)| p * r).sum();
                reward_t[[a, s]] = self.reward_sign * expected;
            }
        }

        debug!("parsed model: Ns={num_states}, Na={num_actions}, discount={discount}");
        DenseMdp::new(discount, transitions, reward_t)
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn current_line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last().copied())
            .map_or(0, |t| t.line)
    }

    fn required(&mut self, what: &str) -> Result<Token<'a>> {
        let line = self.current_line();
        self.next()
            .ok_or_else(|| SolverError::parse(line, format!("expected {what}, found end of input")))
    }

    fn expect_colon(&mut self) -> Result<()> {
        let token = self.required("':'")?;
        if token.text != ":" {
            return Err(SolverError::parse(
                token.line,
                format!("expected ':', found '{}'", token.text),
            ));
        }
        Ok(())
    }

    fn at_colon(&self) -> bool {
        self.peek().is_some_and(|t| t.text == ":")
    }

    fn number(&mut self) -> Result<f64> {
        let token = self.required("a number")?;
        token.text.parse::<f64>().map_err(|_| {
            SolverError::parse(token.line, format!("expected a number, found '{}'", token.text))
        })
    }

    fn numbers(&mut self, n: usize) -> Result<Vec<f64>> {
        (0..n).map(|_| self.number()).collect()
    }

    /// Either a count or a list of names, all on the declaring line.
    fn labels(&mut self, line: usize) -> Result<Labels> {
        let mut names = Vec::new();
        while let Some(token) = self.peek().filter(|t| t.line == line) {
            names.push(token.text.to_string());
            self.pos += 1;
        }
        match names.as_slice() {
            [] => Err(SolverError::parse(line, "expected a count or a list of names")),
            [single] if single.parse::<usize>().is_ok() => Ok(Labels {
                count: single.parse::<usize>().unwrap_or(0),
                names: Vec::new(),
            }),
            _ => Ok(Labels {
                count: names.len(),
                names,
            }),
        }
    }

    fn is_section_start(&self, pos: usize) -> bool {
        let Some(token) = self.tokens.get(pos) else {
            return false;
        };
        if !SECTION_KEYWORDS.contains(&token.text) {
            return false;
        }
        // `start include:` and `start exclude:` put a word before the colon.
        match self.tokens.get(pos + 1).map(|t| t.text) {
            Some(":") => true,
            Some("include") | Some("exclude") => token.text == "start",
            _ => false,
        }
    }

    fn skip_section(&mut self) {
        while self.pos < self.tokens.len() && !self.is_section_start(self.pos) {
            self.pos += 1;
        }
    }

    fn dims(&self, line: usize) -> Result<(usize, usize)> {
        let ns = self
            .states
            .as_ref()
            .ok_or_else(|| SolverError::parse(line, "'states:' must be declared before T: and R:"))?
            .count;
        let na = self
            .actions
            .as_ref()
            .ok_or_else(|| SolverError::parse(line, "'actions:' must be declared before T: and R:"))?
            .count;
        Ok((ns, na))
    }

    /// The model is sized by the first `T:` or `R:` entry, so its dimensions
    /// cannot change afterwards.
    fn reject_after_entries(&self, token: Token<'_>) -> Result<()> {
        if self.model.is_some() {
            return Err(SolverError::parse(
                token.line,
                format!("'{}:' must be declared before any T: or R: entry", token.text),
            ));
        }
        Ok(())
    }

    fn ensure_model(&mut self, line: usize) -> Result<()> {
        if self.model.is_none() {
            let (ns, na) = self.dims(line)?;
            self.model = Some(Model {
                transitions: vec![Array2::zeros((ns, ns)); na],
                rewards: vec![Array2::zeros((ns, ns)); na],
            });
        }
        Ok(())
    }

    fn select_actions(&mut self) -> Result<Vec<usize>> {
        let token = self.required("an action")?;
        let labels = self.actions.clone().unwrap_or_default();
        labels.select(&token, "action")
    }

    fn select_states(&mut self) -> Result<Vec<usize>> {
        let token = self.required("a state")?;
        let labels = self.states.clone().unwrap_or_default();
        labels.select(&token, "state")
    }

    fn model_mut(&mut self) -> &mut Model {
        // ensure_model runs before every entry, so the model always exists here.
        self.model.get_or_insert_with(|| Model {
            transitions: Vec::new(),
            rewards: Vec::new(),
        })
    }

    fn transition_entry(&mut self) -> Result<()> {
        let line = self.current_line();
        self.ensure_model(line)?;
        let (ns, _) = self.dims(line)?;
        let actions = self.select_actions()?;

        if !self.at_colon() {
            let matrix = self.matrix_block(ns)?;
            let model = self.model_mut();
            for a in actions {
                model.transitions[a].assign(&matrix);
            }
            return Ok(());
        }
        self.expect_colon()?;
        let from = self.select_states()?;

        if !self.at_colon() {
            let row = self.row_block(ns)?;
            let model = self.model_mut();
            for a in &actions {
                for &s in &from {
                    for (next, &p) in row.iter().enumerate() {
                        model.transitions[*a][[s, next]] = p;
                    }
                }
            }
            return Ok(());
        }
        self.expect_colon()?;
        let to = self.select_states()?;
        let p = self.number()?;
        let model = self.model_mut();
        for a in &actions {
            for &s in &from {
                for &next in &to {
                    model.transitions[*a][[s, next]] = p;
                }
            }
        }
        Ok(())
    }

    /// `identity`, `uniform`, or `n * n` numbers.
    fn matrix_block(&mut self, n: usize) -> Result<Array2<f64>> {
        match self.peek().map(|t| t.text) {
            Some("identity") => {
                self.pos += 1;
                Ok(Array2::eye(n))
            }
            Some("uniform") => {
                self.pos += 1;
                Ok(Array2::from_elem((n, n), 1.0 / n as f64))
            }
            _ => {
                let line = self.current_line();
                let values = self.numbers(n * n)?;
                Array2::from_shape_vec((n, n), values)
                    .map_err(|e| SolverError::parse(line, e.to_string()))
            }
        }
    }

    /// `uniform` or `n` numbers.
    fn row_block(&mut self, n: usize) -> Result<Vec<f64>> {
        if self.peek().is_some_and(|t| t.text == "uniform") {
            self.pos += 1;
            return Ok(vec![1.0 / n as f64; n]);
        }
        self.numbers(n)
    }

    fn reward_entry(&mut self) -> Result<()> {
        let line = self.current_line();
        self.ensure_model(line)?;
        let (ns, _) = self.dims(line)?;
        let num_obs = self.observations.count.max(1);

        let actions = self.select_actions()?;
        self.expect_colon()?;
        let from = self.select_states()?;

        // R: a : s  followed by an ns x num_obs matrix.
        if !self.at_colon() {
            let mut rows = Vec::with_capacity(ns);
            for _ in 0..ns {
                let row_line = self.current_line();
                let values = self.numbers(num_obs)?;
                rows.push(observation_independent(&values, row_line)?);
            }
            let model = self.model_mut();
            for a in &actions {
                for &s in &from {
                    for (next, &r) in rows.iter().enumerate() {
                        model.rewards[*a][[s, next]] = r;
                    }
                }
            }
            return Ok(());
        }
        self.expect_colon()?;
        let to = self.select_states()?;

        let value = if self.at_colon() {
            self.expect_colon()?;
            let obs = self.required("an observation")?;
            if obs.text != "*" && num_obs > 1 {
                return Err(SolverError::parse(
                    obs.line,
                    "observation-dependent rewards are not supported",
                ));
            }
            if obs.text != "*" && self.observations.count > 0 && self.observations.resolve(obs.text).is_none() {
                return Err(SolverError::parse(
                    obs.line,
                    format!("unknown observation '{}'", obs.text),
                ));
            }
            self.number()?
        } else {
            let vec_line = self.current_line();
            let values = self.numbers(num_obs)?;
            observation_independent(&values, vec_line)?
        };

        let model = self.model_mut();
        for a in &actions {
            for &s in &from {
                for &next in &to {
                    model.rewards[*a][[s, next]] = value;
                }
            }
        }
        Ok(())
    }
}

fn observation_independent(values: &[f64], line: usize) -> Result<f64> {
    let first = values.first().copied().unwrap_or(0.0);
    if values.iter().any(|&v| v != first) {
        return Err(SolverError::parse(
            line,
            "observation-dependent rewards are not supported",
        ));
    }
    Ok(first)
}
