use super::funcs::FunctionRegistry;
use serde_json::Value;
use std::collections::HashMap;

/// 模板表达式：路径取值、字面量、比较与逻辑运算、过滤器管道
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// 首段为变量名，其后为字段/下标访问
    Path(Vec<Segment>),
    Not(Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Filter {
        input: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Field(String),
    Index(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(f64),
    Op(&'static str),
}

fn lex(src: &str) -> Result<Vec<Tok>, String> {
    let mut toks = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    let Some(&c2) = chars.get(i) else {
                        return Err("字符串未闭合".to_string());
                    };
                    i += 1;
                    if c2 == quote {
                        break;
                    }
                    s.push(c2);
                }
                toks.push(Tok::Str(s));
            }
            c if c.is_ascii_digit() => {
                let mut s = String::new();
                while let Some(&c2) = chars.get(i) {
                    if c2.is_ascii_digit() || c2 == '.' {
                        s.push(c2);
                        i += 1;
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Num(s.parse().map_err(|_| format!("数字无效: {s}"))?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&c2) = chars.get(i) {
                    if c2.is_alphanumeric() || c2 == '_' {
                        s.push(c2);
                        i += 1;
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Ident(s));
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                toks.push(Tok::Op("=="));
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                toks.push(Tok::Op("!="));
                i += 2;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                toks.push(Tok::Op("&&"));
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                toks.push(Tok::Op("||"));
                i += 2;
            }
            '!' => {
                toks.push(Tok::Op("!"));
                i += 1;
            }
            '|' => {
                toks.push(Tok::Op("|"));
                i += 1;
            }
            '.' => {
                toks.push(Tok::Op("."));
                i += 1;
            }
            '[' | ']' | '(' | ')' | ',' => {
                toks.push(Tok::Op(match c {
                    '[' => "[",
                    ']' => "]",
                    '(' => "(",
                    ')' => ")",
                    _ => ",",
                }));
                i += 1;
            }
            other => return Err(format!("意外的字符 '{other}'")),
        }
    }
    Ok(toks)
}

struct ExprParser {
    toks: Vec<Tok>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if let Some(Tok::Op(o)) = self.peek()
            && *o == op
        {
            self.pos += 1;
            return true;
        }
        false
    }

    fn eat_ident(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Ident(s)) if s == kw) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expr(&mut self) -> Result<Expr, String> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.and_expr()?;
        while self.eat_op("||") || self.eat_ident("or") {
            let right = self.and_expr()?;
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.eq_expr()?;
        while self.eat_op("&&") || self.eat_ident("and") {
            let right = self.eq_expr()?;
            left = Expr::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn eq_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.unary_expr()?;
        loop {
            let op = if self.eat_op("==") {
                BinOp::Eq
            } else if self.eat_op("!=") {
                BinOp::Ne
            } else {
                break;
            };
            let right = self.unary_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<Expr, String> {
        if self.eat_op("!") || self.eat_ident("not") {
            return Ok(Expr::Not(Box::new(self.unary_expr()?)));
        }
        self.pipe_expr()
    }

    fn pipe_expr(&mut self) -> Result<Expr, String> {
        let mut input = self.primary()?;
        while self.eat_op("|") {
            let Some(Tok::Ident(name)) = self.next() else {
                return Err("'|' 后应为过滤器名".to_string());
            };
            let mut args = Vec::new();
            if self.eat_op("(") {
                if !self.eat_op(")") {
                    loop {
                        args.push(self.expr()?);
                        if self.eat_op(",") {
                            continue;
                        }
                        if self.eat_op(")") {
                            break;
                        }
                        return Err("过滤器参数列表未闭合".to_string());
                    }
                }
            }
            input = Expr::Filter {
                input: Box::new(input),
                name,
                args,
            };
        }
        Ok(input)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            // 整数字面量保持整数，与渲染数据里的整数可直接比较
            Some(Tok::Num(n)) => Ok(Expr::Literal(if n.fract() == 0.0 && n.abs() < 9e15 {
                Value::from(n as i64)
            } else {
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            })),
            Some(Tok::Ident(s)) => match s.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ => {
                    let mut segments = vec![Segment::Field(s)];
                    loop {
                        if self.eat_op(".") {
                            let Some(Tok::Ident(field)) = self.next() else {
                                return Err("'.' 后应为字段名".to_string());
                            };
                            segments.push(Segment::Field(field));
                        } else if self.eat_op("[") {
                            let index = self.expr()?;
                            if !self.eat_op("]") {
                                return Err("下标未闭合".to_string());
                            }
                            segments.push(Segment::Index(Box::new(index)));
                        } else {
                            break;
                        }
                    }
                    Ok(Expr::Path(segments))
                }
            },
            Some(Tok::Op("(")) => {
                let inner = self.expr()?;
                if !self.eat_op(")") {
                    return Err("括号未闭合".to_string());
                }
                Ok(inner)
            }
            Some(other) => Err(format!("意外的 token {other:?}")),
            None => Err("表达式不完整".to_string()),
        }
    }
}

/// 解析表达式源码
pub fn parse(src: &str) -> Result<Expr, String> {
    let mut parser = ExprParser {
        toks: lex(src)?,
        pos: 0,
    };
    let expr = parser.expr()?;
    if parser.pos != parser.toks.len() {
        return Err(format!("表达式存在多余内容: {src}"));
    }
    Ok(expr)
}

/// 求值环境：局部作用域栈（循环变量）+ 渲染数据根 + 函数注册表
pub struct EvalContext<'a> {
    pub scopes: &'a [HashMap<String, Value>],
    pub data: &'a Value,
    pub funcs: &'a FunctionRegistry,
}

impl EvalContext<'_> {
    /// 变量解析：局部作用域自内向外，最后落到数据根
    pub fn lookup(&self, name: &str) -> Value {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.get(name) {
                return v.clone();
            }
        }
        self.data.get(name).cloned().unwrap_or(Value::Null)
    }
}

pub fn eval(expr: &Expr, ctx: &EvalContext) -> Result<Value, String> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Path(segments) => {
            let Segment::Field(base) = &segments[0] else {
                return Err("路径首段必须是变量名".to_string());
            };
            let mut value = ctx.lookup(base);
            for segment in &segments[1..] {
                value = match segment {
                    Segment::Field(name) => value.get(name).cloned().unwrap_or(Value::Null),
                    Segment::Index(index) => {
                        let idx = eval(index, ctx)?;
                        match &idx {
                            Value::Number(n) => n
                                .as_u64()
                                .and_then(|i| value.get(i as usize).cloned())
                                .unwrap_or(Value::Null),
                            Value::String(s) => value.get(s).cloned().unwrap_or(Value::Null),
                            other => return Err(format!("下标类型无效: {other}")),
                        }
                    }
                };
            }
            Ok(value)
        }
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, ctx)?))),
        Expr::Binary { op, left, right } => match op {
            BinOp::And => {
                let l = eval(left, ctx)?;
                if !truthy(&l) {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truthy(&eval(right, ctx)?)))
            }
            BinOp::Or => {
                let l = eval(left, ctx)?;
                if truthy(&l) {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truthy(&eval(right, ctx)?)))
            }
            BinOp::Eq => Ok(Value::Bool(eval(left, ctx)? == eval(right, ctx)?)),
            BinOp::Ne => Ok(Value::Bool(eval(left, ctx)? != eval(right, ctx)?)),
        },
        Expr::Filter { input, name, args } => {
            let input = eval(input, ctx)?;
            let args = args
                .iter()
                .map(|a| eval(a, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            ctx.funcs.call(name, &input, &args)
        }
    }
}

/// 真值判定：null/false/0/空串/空集合为假
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval_str(src: &str, data: Value) -> Result<Value, String> {
        let funcs = FunctionRegistry::new();
        let ctx = EvalContext {
            scopes: &[],
            data: &data,
            funcs: &funcs,
        };
        eval(&parse(src)?, &ctx)
    }

    #[test]
    fn path_lookup() {
        let data = json!({"user": {"name": "Ann", "tags": ["a", "b"]}});
        assert_eq!(eval_str("user.name", data.clone()).unwrap(), json!("Ann"));
        assert_eq!(eval_str("user.tags[1]", data.clone()).unwrap(), json!("b"));
        assert_eq!(eval_str("user['name']", data.clone()).unwrap(), json!("Ann"));
        // 缺失路径宽松求值为 null
        assert_eq!(eval_str("user.missing.deep", data).unwrap(), Value::Null);
    }

    #[test]
    fn logic_and_comparison() {
        let data = json!({"a": 1, "b": "", "name": "x"});
        assert_eq!(eval_str("a && !b", data.clone()).unwrap(), json!(true));
        assert_eq!(eval_str("b || a", data.clone()).unwrap(), json!(true));
        assert_eq!(eval_str("name == 'x'", data.clone()).unwrap(), json!(true));
        assert_eq!(eval_str("name != 'x'", data.clone()).unwrap(), json!(false));
        assert_eq!(eval_str("not a", data).unwrap(), json!(false));
    }

    #[test]
    fn filter_pipeline() {
        let data = json!({"name": "ann lee"});
        assert_eq!(
            eval_str("name | capitalize | truncate(6)", data).unwrap(),
            json!("Ann le…")
        );
    }

    #[test]
    fn unknown_filter_propagates() {
        let err = eval_str("x | boom", json!({"x": 1})).unwrap_err();
        assert!(err.contains("boom"), "{err}");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("a ==").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("'unclosed").is_err());
        assert!(parse("f(").is_err());
    }
}
