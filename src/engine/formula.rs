//! Mnemonic formula recognition and extraction
//!
//! Cost sheets annotate calculated columns with short formulas such as
//! `B=c+(d+e+f)*(1+g)`: a target letter, `=`, and arithmetic over other
//! single letters and numbers. These are recorded, never evaluated.

use crate::types::{Cell, FormulaMap, HeaderSpec, Sheet};
use std::iter::Peekable;
use std::str::Chars;

/// A token of a formula's right-hand side
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A single-letter column code
    Code(char),
    /// A numeric literal, kept as written (e.g. `1`, `0.05`, `3%`)
    Number(String),
    /// `+ - * / ^ × ÷`
    Operator(char),
    OpenParen,
    CloseParen,
}

/// A parsed mnemonic formula
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaText {
    pub target: char,
    pub tokens: Vec<Token>,
}

impl FormulaText {
    /// Parse `text` if it has the formula shape; `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let mut lexer = Lexer::new(text);

        lexer.skip_whitespace();
        let target = lexer.next().filter(char::is_ascii_alphabetic)?;
        lexer.skip_whitespace();
        if !matches!(lexer.next(), Some('=') | Some('＝')) {
            return None;
        }

        let tokens = lexer.tokenize()?;
        let formula = Self { target, tokens };
        formula.is_well_formed().then_some(formula)
    }

    /// Distinct right-hand letters in order of first appearance
    pub fn operands(&self) -> Vec<char> {
        let mut seen = Vec::new();
        for token in &self.tokens {
            if let Token::Code(c) = token {
                if !seen.contains(c) {
                    seen.push(*c);
                }
            }
        }
        seen
    }

    /// Target letter followed by the operands
    pub fn codes(&self) -> Vec<char> {
        let mut codes = vec![self.target];
        for c in self.operands() {
            if !codes.contains(&c) {
                codes.push(c);
            }
        }
        codes
    }

    /// Operands and operators must alternate: `H=2.4m` and `B=c d` are
    /// annotations, not formulas. A leading `-` or `+` is a sign.
    fn is_well_formed(&self) -> bool {
        let mut depth: i32 = 0;
        let mut expect_operand = true;
        for token in &self.tokens {
            match token {
                Token::Code(_) | Token::Number(_) => {
                    if !expect_operand {
                        return false;
                    }
                    expect_operand = false;
                }
                Token::OpenParen => {
                    if !expect_operand {
                        return false;
                    }
                    depth += 1;
                }
                Token::CloseParen => {
                    depth -= 1;
                    if expect_operand || depth < 0 {
                        return false;
                    }
                }
                Token::Operator(op) => {
                    if expect_operand && !matches!(op, '-' | '+') {
                        return false;
                    }
                    expect_operand = true;
                }
            }
        }
        depth == 0
            && !expect_operand
            && self.tokens.iter().any(|t| matches!(t, Token::Code(_)))
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
        }
    }

    fn next(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    /// Tokenize the rest of the input; `None` on any character outside the grammar
    fn tokenize(&mut self) -> Option<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(c) = self.chars.next() else {
                return Some(tokens);
            };
            let token = match c {
                c if c.is_ascii_alphabetic() => {
                    // Multi-letter words are identifiers, not mnemonic codes
                    if self.chars.peek().is_some_and(|n| n.is_ascii_alphabetic()) {
                        return None;
                    }
                    Token::Code(c)
                }
                c if c.is_ascii_digit() || c == '.' => Token::Number(self.read_number(c)),
                '+' | '-' | '*' | '/' | '^' | '×' | '÷' => Token::Operator(c),
                '(' | '（' => Token::OpenParen,
                ')' | '）' => Token::CloseParen,
                _ => return None,
            };
            tokens.push(token);
        }
    }

    fn read_number(&mut self, first: char) -> String {
        let mut number = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' || c == '%' {
                number.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        number
    }
}

/// Collects formula cells below the header into a `FormulaMap`
pub struct FormulaExtractor<'a> {
    sheet: &'a Sheet,
    header: &'a HeaderSpec,
}

impl<'a> FormulaExtractor<'a> {
    pub fn new(sheet: &'a Sheet, header: &'a HeaderSpec) -> Self {
        Self { sheet, header }
    }

    /// Scan every row from `first_row` down. The first formula found in a
    /// column is kept; later ones in the same column are ignored.
    pub fn extract(&self, first_row: usize) -> FormulaMap {
        let mut formulas = FormulaMap::new();
        for row in self.sheet.grid.rows().iter().skip(first_row) {
            for (col, cell) in row.iter().enumerate() {
                let Cell::Formula(text) = cell else {
                    continue;
                };
                let Some(target) = self.header.name(col) else {
                    continue;
                };
                formulas
                    .entry(target.to_string())
                    .or_insert_with(|| text.clone());
            }
        }
        tracing::debug!(
            sheet = %self.sheet.name,
            count = formulas.len(),
            "extracted formulas"
        );
        formulas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeaderSpec;

    #[test]
    fn test_parse_cost_formula() {
        let f = FormulaText::parse("B=c+(d+e+f)*(1+g)").unwrap();
        assert_eq!(f.target, 'B');
        assert_eq!(f.operands(), vec!['c', 'd', 'e', 'f', 'g']);
        assert_eq!(f.codes(), vec!['B', 'c', 'd', 'e', 'f', 'g']);
    }

    #[test]
    fn test_parse_accepts_full_width_symbols() {
        let f = FormulaText::parse("A ＝ b×（1+c）").unwrap();
        assert_eq!(f.operands(), vec!['b', 'c']);
    }

    #[test]
    fn test_parse_single_alias() {
        let f = FormulaText::parse("B=c").unwrap();
        assert_eq!(f.tokens, vec![Token::Code('c')]);
    }

    #[test]
    fn test_parse_rejects_non_formulas() {
        assert!(FormulaText::parse("c=主材单价").is_none());
        assert!(FormulaText::parse("A=1+2").is_none()); // no codes
        assert!(FormulaText::parse("total=a+b").is_none());
        assert!(FormulaText::parse("B=cd+e").is_none());
        assert!(FormulaText::parse("B=(c+d").is_none());
        assert!(FormulaText::parse("B=c+").is_none());
        assert!(FormulaText::parse("B c+d").is_none());
        assert!(FormulaText::parse("项目名称").is_none());
    }

    #[test]
    fn test_parse_rejects_adjacent_operands() {
        assert!(FormulaText::parse("H=2.4m").is_none());
        assert!(FormulaText::parse("B=c d").is_none());
        assert!(FormulaText::parse("B=(c)d").is_none());
        assert!(FormulaText::parse("B=c(d+e)").is_none());
        assert!(FormulaText::parse("B=c*()").is_none());
        assert!(FormulaText::parse("B=c**d").is_none());
        assert_eq!(Cell::from_text("H=2.4m"), Cell::Text("H=2.4m".to_string()));
    }

    #[test]
    fn test_parse_accepts_leading_sign() {
        let f = FormulaText::parse("B=-c+(-d)*2").unwrap();
        assert_eq!(f.operands(), vec!['c', 'd']);
    }

    #[test]
    fn test_parse_numbers_with_percent() {
        let f = FormulaText::parse("D=e*5%").unwrap();
        assert_eq!(
            f.tokens,
            vec![
                Token::Code('e'),
                Token::Operator('*'),
                Token::Number("5%".to_string())
            ]
        );
    }

    #[test]
    fn test_extract_first_formula_per_column_wins() {
        let header = HeaderSpec::from_unique(vec!["名称".into(), "单价".into()]);
        let sheet = Sheet::new(
            "s",
            vec![
                vec![Cell::from_text("名称"), Cell::from_text("单价")],
                vec![Cell::Empty, Cell::from_text("B=c+d")],
                vec![Cell::Empty, Cell::from_text("B=c*d")],
            ],
        );
        let formulas = FormulaExtractor::new(&sheet, &header).extract(1);
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas["单价"], "B=c+d");
    }

    #[test]
    fn test_extract_without_formulas_is_empty() {
        let header = HeaderSpec::from_unique(vec!["名称".into()]);
        let sheet = Sheet::new("s", vec![vec![Cell::from_text("名称")]]);
        assert!(FormulaExtractor::new(&sheet, &header).extract(1).is_empty());
    }
}
