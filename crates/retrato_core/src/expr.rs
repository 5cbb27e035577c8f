//! Compiled evaluator for user-entered right-hand sides.
//!
//! An equation string like `mu*(1 - x^2)*y - x` is parsed into an AST,
//! compiled to a small bytecode program, and evaluated on a stack
//! machine. The machine is generic over [`Scalar`], so the same
//! compiled program produces plain values under `f64` and derivatives
//! under [`Dual`](crate::autodiff::Dual).

use crate::autodiff::Dual;
use crate::error::{EvalError, EvalResult};
use crate::traits::{Scalar, VectorField};
use std::cell::RefCell;
use std::collections::HashMap;

/// Instructions of the stack machine.
#[derive(Debug, Clone, Copy)]
pub enum OpCode {
    /// Push a literal value.
    Const(f64),
    /// Push a state variable by index (definition order, e.g. 0=x, 1=y).
    Var(usize),
    /// Push a parameter by index.
    Param(usize),
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
    Abs,
}

/// A compiled sequence of operations for one equation.
#[derive(Debug, Clone)]
pub struct Program {
    ops: Vec<OpCode>,
}

/// Executes `program` against the given state and parameter vectors.
///
/// `stack` is a scratch buffer reused across calls to avoid
/// re-allocating inside integration loops.
pub fn run_program<T: Scalar>(program: &Program, vars: &[T], params: &[T], stack: &mut Vec<T>) -> T {
    stack.clear();
    for op in &program.ops {
        match *op {
            OpCode::Const(v) => stack.push(T::from_f64(v)),
            OpCode::Var(i) => stack.push(vars[i]),
            OpCode::Param(i) => stack.push(params[i]),
            OpCode::Add => binary(stack, |a, b| a + b),
            OpCode::Sub => binary(stack, |a, b| a - b),
            OpCode::Mul => binary(stack, |a, b| a * b),
            OpCode::Div => binary(stack, |a, b| a / b),
            OpCode::Pow => binary(stack, |a, b| a.powf(b)),
            OpCode::Neg => unary(stack, |a| -a),
            OpCode::Sin => unary(stack, Scalar::sin),
            OpCode::Cos => unary(stack, Scalar::cos),
            OpCode::Tan => unary(stack, Scalar::tan),
            OpCode::Exp => unary(stack, Scalar::exp),
            OpCode::Ln => unary(stack, Scalar::ln),
            OpCode::Sqrt => unary(stack, Scalar::sqrt),
            OpCode::Abs => unary(stack, Scalar::abs),
        }
    }
    stack.pop().unwrap_or_else(T::zero)
}

fn binary<T: Scalar>(stack: &mut Vec<T>, f: impl FnOnce(T, T) -> T) {
    let b = stack.pop().unwrap_or_else(T::zero);
    let a = stack.pop().unwrap_or_else(T::zero);
    stack.push(f(a, b));
}

fn unary<T: Scalar>(stack: &mut Vec<T>, f: impl FnOnce(T) -> T) {
    let a = stack.pop().unwrap_or_else(T::zero);
    stack.push(f(a));
}

// --- AST ---

#[derive(Debug)]
enum Expr {
    Number(f64),
    Symbol(String),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    Negate(Box<Expr>),
    Call(String, Box<Expr>),
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

// --- Tokenizer ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> EvalResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut text = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    text.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = text
                .parse()
                .map_err(|_| EvalError::validation(format!("malformed number literal '{text}'")))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            tokens.push(match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => {
                    return Err(EvalError::validation(format!(
                        "unexpected character '{other}' in expression"
                    )))
                }
            });
            chars.next();
        }
    }
    Ok(tokens)
}

// --- Parser ---

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expression(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_term()?;
        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> EvalResult<Expr> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let operand = self.parse_unary()?;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.parse_power()
    }

    // Exponentiation binds tighter than unary minus and associates to
    // the right: 2^3^2 is 2^(3^2).
    fn parse_power(&mut self) -> EvalResult<Expr> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), BinOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> EvalResult<Expr> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let arg = self.parse_expression()?;
                    match self.consume() {
                        Some(Token::RParen) => Ok(Expr::Call(name, Box::new(arg))),
                        _ => Err(EvalError::validation(format!(
                            "missing ')' after argument of '{name}'"
                        ))),
                    }
                } else {
                    Ok(Expr::Symbol(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(EvalError::validation("missing closing ')'")),
                }
            }
            other => Err(EvalError::validation(format!(
                "unexpected token {other:?} in expression"
            ))),
        }
    }
}

// --- Compiler ---

struct Compiler {
    var_indices: HashMap<String, usize>,
    param_indices: HashMap<String, usize>,
}

impl Compiler {
    fn new(var_names: &[&str], param_names: &[&str]) -> Self {
        let var_indices = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        let param_indices = param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Self {
            var_indices,
            param_indices,
        }
    }

    fn compile(&self, expr: &Expr) -> EvalResult<Program> {
        let mut ops = Vec::new();
        self.emit(expr, &mut ops)?;
        Ok(Program { ops })
    }

    fn emit(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> EvalResult<()> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::Const(*n)),
            Expr::Symbol(name) => {
                if let Some(&i) = self.var_indices.get(name) {
                    ops.push(OpCode::Var(i));
                } else if let Some(&i) = self.param_indices.get(name) {
                    ops.push(OpCode::Param(i));
                } else {
                    match name.as_str() {
                        "pi" => ops.push(OpCode::Const(std::f64::consts::PI)),
                        "e" | "E" => ops.push(OpCode::Const(std::f64::consts::E)),
                        _ => {
                            return Err(EvalError::validation(format!(
                                "unknown variable or parameter '{name}'"
                            )))
                        }
                    }
                }
            }
            Expr::Binary(left, op, right) => {
                self.emit(left, ops)?;
                self.emit(right, ops)?;
                ops.push(match op {
                    BinOp::Add => OpCode::Add,
                    BinOp::Sub => OpCode::Sub,
                    BinOp::Mul => OpCode::Mul,
                    BinOp::Div => OpCode::Div,
                    BinOp::Pow => OpCode::Pow,
                });
            }
            Expr::Negate(operand) => {
                self.emit(operand, ops)?;
                ops.push(OpCode::Neg);
            }
            Expr::Call(func, arg) => {
                self.emit(arg, ops)?;
                ops.push(match func.as_str() {
                    "sin" => OpCode::Sin,
                    "cos" => OpCode::Cos,
                    "tan" => OpCode::Tan,
                    "exp" => OpCode::Exp,
                    "ln" | "log" => OpCode::Ln,
                    "sqrt" => OpCode::Sqrt,
                    "abs" => OpCode::Abs,
                    _ => {
                        return Err(EvalError::validation(format!("unknown function '{func}'")))
                    }
                });
            }
        }
        Ok(())
    }
}

/// Compiles a single expression over the given symbol tables.
pub fn compile_expression(
    expression: &str,
    var_names: &[&str],
    param_names: &[&str],
) -> EvalResult<Program> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(EvalError::validation("empty expression"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let ast = parser.parse_expression()?;
    if parser.pos != parser.tokens.len() {
        return Err(EvalError::validation(format!(
            "trailing input after expression: '{expression}'"
        )));
    }
    Compiler::new(var_names, param_names).compile(&ast)
}

// --- SymbolicField ---

/// A [`VectorField`] built from compiled equation strings, one program
/// per state variable.
///
/// The scratch stack lives in a `RefCell` so `eval` can take `&self`;
/// this makes the field `!Sync`, which is fine for the synchronous
/// request/response analysis model of this crate.
pub struct SymbolicField<T: Scalar> {
    programs: Vec<Program>,
    params: Vec<T>,
    stack: RefCell<Vec<T>>,
}

impl SymbolicField<f64> {
    /// Compiles one equation per state variable. Parameter values are
    /// bound at compile time; a fresh field is constructed per
    /// analysis run.
    pub fn compile(
        equations: &[&str],
        var_names: &[&str],
        param_names: &[&str],
        param_values: &[f64],
    ) -> EvalResult<Self> {
        if equations.len() != var_names.len() {
            return Err(EvalError::validation(format!(
                "{} equations for {} state variables",
                equations.len(),
                var_names.len()
            )));
        }
        if param_names.len() != param_values.len() {
            return Err(EvalError::validation(
                "parameter name and value lists differ in length",
            ));
        }
        let programs = equations
            .iter()
            .map(|eq| compile_expression(eq, var_names, param_names))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(Self {
            programs,
            params: param_values.to_vec(),
            stack: RefCell::new(Vec::with_capacity(64)),
        })
    }

    /// Lifts the field into dual numbers for Jacobian work. The
    /// parameters become constants; only state perturbations carry
    /// derivative seeds.
    pub fn to_dual(&self) -> SymbolicField<Dual> {
        SymbolicField {
            programs: self.programs.clone(),
            params: self.params.iter().map(|&p| Dual::constant(p)).collect(),
            stack: RefCell::new(Vec::with_capacity(64)),
        }
    }
}

impl<T: Scalar> VectorField<T> for SymbolicField<T> {
    fn dimension(&self) -> usize {
        self.programs.len()
    }

    fn eval(&self, _t: T, x: &[T], out: &mut [T]) {
        let mut stack = self.stack.borrow_mut();
        for (i, program) in self.programs.iter().enumerate() {
            out[i] = run_program(program, x, &self.params, &mut stack);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{compile_expression, run_program, SymbolicField};
    use crate::error::EvalError;
    use crate::traits::VectorField;

    fn eval(expression: &str, x: f64, y: f64) -> f64 {
        let program = compile_expression(expression, &["x", "y"], &[]).expect("should compile");
        run_program(&program, &[x, y], &[], &mut Vec::new())
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("1 + 2*3", 0.0, 0.0), 7.0);
        assert_eq!(eval("(1 + 2)*3", 0.0, 0.0), 9.0);
        assert_eq!(eval("2*x - y/2", 3.0, 4.0), 4.0);
    }

    #[test]
    fn power_is_right_associative_and_binds_tight() {
        assert_eq!(eval("2^3^2", 0.0, 0.0), 512.0);
        // -x^2 reads as -(x^2).
        assert_eq!(eval("-x^2", 3.0, 0.0), -9.0);
    }

    #[test]
    fn elementary_functions_and_constants() {
        assert!((eval("sin(pi/2)", 0.0, 0.0) - 1.0).abs() < 1e-12);
        assert!((eval("ln(e)", 0.0, 0.0) - 1.0).abs() < 1e-12);
        assert!((eval("log(x)", 10.0, 0.0) - 10.0_f64.ln()).abs() < 1e-12);
        assert!((eval("sqrt(abs(x))", -9.0, 0.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_symbols_are_validation_errors() {
        let result = compile_expression("x + bogus", &["x"], &["mu"]);
        match result {
            Err(EvalError::Validation(msg)) => assert!(msg.contains("bogus")),
            other => panic!("expected validation error, got {other:?}"),
        }
        let result = compile_expression("frob(x)", &["x"], &[]);
        assert!(matches!(result, Err(EvalError::Validation(_))));
    }

    #[test]
    fn symbolic_field_evaluates_van_der_pol() {
        let field = SymbolicField::compile(
            &["y", "mu*(1 - x^2)*y - x"],
            &["x", "y"],
            &["mu"],
            &[2.0],
        )
        .expect("should compile");
        let mut out = [0.0, 0.0];
        field.eval(0.0, &[0.5, 1.0], &mut out);
        assert_eq!(out[0], 1.0);
        assert!((out[1] - (2.0 * 0.75 * 1.0 - 0.5)).abs() < 1e-12);
    }

    #[test]
    fn dual_lift_keeps_values() {
        let field =
            SymbolicField::compile(&["mu*x"], &["x"], &["mu"], &[3.0]).expect("should compile");
        let dual = field.to_dual();
        let mut out = [crate::autodiff::Dual::constant(0.0)];
        dual.eval(
            crate::autodiff::Dual::constant(0.0),
            &[crate::autodiff::Dual::variable(2.0)],
            &mut out,
        );
        assert_eq!(out[0].val, 6.0);
        assert_eq!(out[0].eps, 3.0);
    }
}
