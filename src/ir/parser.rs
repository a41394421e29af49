use thiserror::Error;

use super::{Function, Instr, Op, Program};

#[derive(Debug, Error, PartialEq)]
#[error("line {line}: {msg}")]
pub struct ParseError {
    pub line: usize,
    pub msg: String,
}

#[derive(Debug, PartialEq, Clone)]
enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    Punct(char),
}

fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '#' => break,
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            c if c.is_ascii_digit() => {
                tokens.push(Token::Int(lex_int(&mut chars, false)?));
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => text.push(c),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Str(text));
            }
            '-' => {
                chars.next();
                // A minus directly followed by a digit is a negative
                // immediate; operands of subtraction are always separated
                // from the sign by whitespace.
                if chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    tokens.push(Token::Int(lex_int(&mut chars, true)?));
                } else {
                    tokens.push(Token::Punct('-'));
                }
            }
            '=' | '+' | '*' | '<' | '[' | ']' | '(' | ')' | ':' | '@' => {
                chars.next();
                tokens.push(Token::Punct(c));
            }
            c => return Err(format!("unexpected character `{c}`")),
        }
    }

    Ok(tokens)
}

fn lex_int(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    negative: bool,
) -> Result<i64, String> {
    let mut digits = String::new();
    if negative {
        digits.push('-');
    }
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            digits.push(c);
            chars.next();
        } else {
            break;
        }
    }
    digits
        .parse()
        .map_err(|_| format!("integer literal `{digits}` out of range"))
}

/// Parse a whole program from its textual form: one instruction per line
/// inside a `func ... / return ...` bracket. `#` starts a comment.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let mut program = Program::default();
    let mut current: Option<Function> = None;
    let mut labels: Vec<String> = Vec::new();
    let mut gotos: Vec<(String, usize)> = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let err = |msg: String| ParseError { line, msg };

        let tokens = tokenize(raw).map_err(err)?;
        if tokens.is_empty() {
            continue;
        }

        match tokens.first() {
            Some(Token::Ident(kw)) if kw == "func" => {
                if current.is_some() {
                    return Err(err("`func` before previous function returned".to_string()));
                }
                let (name, params) = parse_header(&tokens[1..]).map_err(err)?;
                current = Some(Function {
                    name,
                    params,
                    body: Vec::new(),
                    ret: String::new(),
                });
                labels.clear();
                gotos.clear();
            }
            Some(Token::Ident(kw)) if kw == "return" => {
                let mut func = current
                    .take()
                    .ok_or_else(|| err("`return` outside of a function".to_string()))?;
                match &tokens[1..] {
                    [Token::Ident(var)] => func.ret = var.clone(),
                    _ => return Err(err("expected `return <var>`".to_string())),
                }
                for (target, goto_line) in gotos.drain(..) {
                    if !labels.contains(&target) {
                        return Err(ParseError {
                            line: goto_line,
                            msg: format!("goto target `{target}` is not defined"),
                        });
                    }
                }
                program.functions.push(func);
            }
            _ => {
                let func = current
                    .as_mut()
                    .ok_or_else(|| err("instruction outside of a function".to_string()))?;
                let instr = parse_instr(&tokens).map_err(err)?;
                match &instr {
                    Instr::Label(name) => {
                        if labels.contains(name) {
                            return Err(err(format!("label `{name}` defined twice")));
                        }
                        labels.push(name.clone());
                    }
                    Instr::Goto(target) | Instr::IfGoto { target, .. } => {
                        gotos.push((target.clone(), line));
                    }
                    _ => {}
                }
                func.body.push(instr);
            }
        }
    }

    if let Some(func) = current {
        return Err(ParseError {
            line: source.lines().count(),
            msg: format!("function `{}` has no `return`", func.name),
        });
    }

    Ok(program)
}

fn parse_header(tokens: &[Token]) -> Result<(String, Vec<String>), String> {
    let [Token::Ident(name), Token::Punct('('), rest @ .., Token::Punct(')')] = tokens else {
        return Err("expected `func <name>(<params>)`".to_string());
    };
    let mut params = Vec::new();
    for token in rest {
        match token {
            Token::Ident(p) => params.push(p.clone()),
            _ => return Err("parameter list may only contain names".to_string()),
        }
    }
    Ok((name.clone(), params))
}

fn parse_instr(tokens: &[Token]) -> Result<Instr, String> {
    use Token::*;

    match tokens {
        [Ident(kw), Ident(v)] if kw == "print" => Ok(Instr::Print(v.clone())),
        [Ident(kw), Str(msg)] if kw == "error" => Ok(Instr::Error(msg.clone())),
        [Ident(kw), Ident(target)] if kw == "goto" => Ok(Instr::Goto(target.clone())),
        [Ident(kw), Ident(cond), Ident(kw2), Ident(target)] if kw == "if0" && kw2 == "goto" => {
            Ok(Instr::IfGoto {
                cond: cond.clone(),
                target: target.clone(),
            })
        }
        [Ident(name), Punct(':')] => Ok(Instr::Label(name.clone())),
        [
            Punct('['),
            Ident(base),
            Punct('+'),
            Int(offset),
            Punct(']'),
            Punct('='),
            Ident(src),
        ] => Ok(Instr::Store {
            base: base.clone(),
            offset: *offset,
            src: src.clone(),
        }),
        [Ident(dst), Punct('='), rhs @ ..] => parse_assignment(dst, rhs),
        _ => Err("unrecognized instruction".to_string()),
    }
}

fn parse_assignment(dst: &str, rhs: &[Token]) -> Result<Instr, String> {
    use Token::*;

    let dst = dst.to_string();
    match rhs {
        [Int(imm)] => Ok(Instr::Const(dst, *imm)),
        [Punct('@'), Ident(func)] => Ok(Instr::FuncAddr(dst, func.clone())),
        [Ident(kw), Ident(size)] if kw == "alloc" => Ok(Instr::Alloc(dst, size.clone())),
        [Ident(kw), Ident(callee), Punct('('), args @ .., Punct(')')] if kw == "call" => {
            let mut arg_names = Vec::new();
            for arg in args {
                match arg {
                    Ident(name) => arg_names.push(name.clone()),
                    _ => return Err("call arguments may only be names".to_string()),
                }
            }
            Ok(Instr::Call {
                dst,
                callee: callee.clone(),
                args: arg_names,
            })
        }
        [Ident(src)] => Ok(Instr::Move(dst, src.clone())),
        [Ident(a), Punct(op), Ident(b)] => {
            let op = match op {
                '+' => Op::Add,
                '-' => Op::Sub,
                '*' => Op::Mul,
                '<' => Op::LessThan,
                _ => return Err(format!("unknown operator `{op}`")),
            };
            Ok(Instr::BinOp(dst, a.clone(), op, b.clone()))
        }
        [Punct('['), Ident(base), Punct('+'), Int(offset), Punct(']')] => Ok(Instr::Load {
            dst,
            base: base.clone(),
            offset: *offset,
        }),
        _ => Err(format!("unrecognized right-hand side for `{dst} = ...`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(body: &str) -> Function {
        let source = format!("func F(a b)\n{body}\nreturn a\n");
        let program = parse(&source).expect("program should parse");
        program.functions.into_iter().next().unwrap()
    }

    #[test]
    fn test_parse_every_instruction_form() {
        let func = parse_one(
            "x = 5\n\
             x = -3\n\
             f = @Callee\n\
             y = x + a\n\
             y = x - a\n\
             y = x * a\n\
             y = x < a\n\
             z = [y + 4]\n\
             [y + 8] = x\n\
             w = x\n\
             m = alloc x\n\
             print w\n\
             error \"bad index\"\n\
             top:\n\
             goto top\n\
             if0 y goto top\n\
             r = call f(x y)",
        );

        assert_eq!(func.name, "F");
        assert_eq!(func.params, vec!["a", "b"]);
        assert_eq!(func.ret, "a");
        assert_eq!(
            func.body,
            vec![
                Instr::Const("x".into(), 5),
                Instr::Const("x".into(), -3),
                Instr::FuncAddr("f".into(), "Callee".into()),
                Instr::BinOp("y".into(), "x".into(), Op::Add, "a".into()),
                Instr::BinOp("y".into(), "x".into(), Op::Sub, "a".into()),
                Instr::BinOp("y".into(), "x".into(), Op::Mul, "a".into()),
                Instr::BinOp("y".into(), "x".into(), Op::LessThan, "a".into()),
                Instr::Load {
                    dst: "z".into(),
                    base: "y".into(),
                    offset: 4,
                },
                Instr::Store {
                    base: "y".into(),
                    offset: 8,
                    src: "x".into(),
                },
                Instr::Move("w".into(), "x".into()),
                Instr::Alloc("m".into(), "x".into()),
                Instr::Print("w".into()),
                Instr::Error("bad index".into()),
                Instr::Label("top".into()),
                Instr::Goto("top".into()),
                Instr::IfGoto {
                    cond: "y".into(),
                    target: "top".into(),
                },
                Instr::Call {
                    dst: "r".into(),
                    callee: "f".into(),
                    args: vec!["x".into(), "y".into()],
                },
            ]
        );
    }

    #[test]
    fn test_parse_multiple_functions() {
        let program = parse(
            "func Main()\n\
             x = 1\n\
             return x\n\
             func Helper(n)\n\
             return n\n",
        )
        .unwrap();
        assert_eq!(program.functions.len(), 2);
        assert_eq!(program.functions[0].name, "Main");
        assert_eq!(program.functions[1].name, "Helper");
        assert!(program.functions[1].body.is_empty());
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let program = parse(
            "# whole-line comment\n\
             func Main()\n\
             \n\
             x = 1  # trailing comment\n\
             return x\n",
        )
        .unwrap();
        assert_eq!(program.functions[0].body.len(), 1);
    }

    #[test]
    fn test_display_round_trips() {
        let source = "func Main(a)\n\
                      x = 2\n\
                      y = x * a\n\
                      print y\n\
                      return y\n";
        let program = parse(source).unwrap();
        let reparsed = parse(&program.to_string()).unwrap();
        assert_eq!(program, reparsed);
    }

    #[test]
    fn test_undefined_goto_target_is_rejected() {
        let result = parse(
            "func Main()\n\
             x = 1\n\
             goto nowhere\n\
             return x\n",
        );
        let err = result.unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.msg.contains("nowhere"));
    }

    #[test]
    fn test_missing_return_is_rejected() {
        let result = parse("func Main()\nx = 1\n");
        assert!(result.unwrap_err().msg.contains("no `return`"));
    }

    #[test]
    fn test_instruction_outside_function_is_rejected() {
        let result = parse("x = 1\n");
        assert_eq!(result.unwrap_err().line, 1);
    }

    #[test]
    fn test_garbage_line_is_rejected() {
        let result = parse("func Main()\nx = = 1\nreturn x\n");
        assert_eq!(result.unwrap_err().line, 2);
    }
}
