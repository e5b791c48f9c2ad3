use crate::error::{CfgError, Result};
use crate::node::{ConfigNode, MISSING_LITERAL, Value};
use regex::Regex;
use std::sync::LazyLock;

/// Dotted (or slashed, for config groups) key path at the start of an override.
static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^[A-Za-z_$][\w\-@$]*(?:[./][\w\-@$]+)*").expect("key pattern is valid")
});

/// What an override does to its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideOp {
	/// `key=value`: set an existing or open key.
	Set,
	/// `+key=value`: add the key even when a closed schema does not declare it.
	ForceAdd,
	/// `~key` or `~key=value`: delete the key.
	Delete,
}

/// A parsed override token.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
	pub op: OverrideOp,
	/// Key path as written, e.g. `db.port` or `db`.
	pub key: String,
	/// Parsed value. Always present for `Set` and `ForceAdd`.
	pub value: Option<Value>,
	/// The original token, kept for error messages and the audit trail.
	pub input: String,
}

impl Override {
	/// Key segments split on `.` and `/`.
	pub fn key_segments(&self) -> Vec<&str> {
		self.key.split(['.', '/']).collect()
	}

	/// The key read as a config group path (`db.engine` -> `db/engine`).
	pub fn group_path(&self) -> String {
		self.key.replace('.', "/")
	}
}

/// Parse every override before any of them is applied.
pub fn parse_overrides<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Override>> {
	tokens
		.iter()
		.map(|token| parse_override(token.as_ref()))
		.collect()
}

/// Parse a single `[+|~]key[=value]` token.
pub fn parse_override(token: &str) -> Result<Override> {
	let (op, rest, offset) = match token.chars().next() {
		Some('+') => (OverrideOp::ForceAdd, &token[1..], 1),
		Some('~') => (OverrideOp::Delete, &token[1..], 1),
		_ => (OverrideOp::Set, token, 0),
	};

	let key_match = KEY_PATTERN
		.find(rest)
		.ok_or_else(|| syntax(token, offset, "expected a key"))?;
	let key = key_match.as_str().to_string();
	let after_key = &rest[key_match.end()..];
	let value_offset = offset + key_match.end();

	let value = match after_key.strip_prefix('=') {
		Some(raw) => Some(parse_value_at(token, raw, value_offset + 1)?),
		None if after_key.is_empty() => None,
		None => {
			return Err(syntax(
				token,
				value_offset,
				format!("unexpected '{after_key}' after key"),
			));
		}
	};

	if value.is_none() && op != OverrideOp::Delete {
		return Err(syntax(token, token.len(), "expected '=' followed by a value"));
	}

	Ok(Override {
		op,
		key,
		value,
		input: token.to_string(),
	})
}

/// Parse a standalone value literal such as `[1, {a: b}]`.
pub fn parse_value(input: &str) -> Result<Value> {
	parse_value_at(input, input, 0)
}

fn parse_value_at(token: &str, raw: &str, offset: usize) -> Result<Value> {
	let mut cursor = Cursor {
		token,
		src: raw,
		pos: 0,
		offset,
	};
	cursor.skip_ws();
	let value = match cursor.peek() {
		Some('[' | '{' | '"' | '\'') => {
			let value = cursor.parse_element()?;
			cursor.skip_ws();
			if let Some(c) = cursor.peek() {
				return Err(cursor.error(format!("unexpected '{c}' after value")));
			}
			value
		}
		// Top-level primitives run to the end of the token.
		_ => classify(raw.trim()),
	};
	Ok(value)
}

struct Cursor<'a> {
	token: &'a str,
	src: &'a str,
	pos: usize,
	offset: usize,
}

impl Cursor<'_> {
	fn peek(&self) -> Option<char> {
		self.src[self.pos..].chars().next()
	}

	fn bump(&mut self) -> Option<char> {
		let c = self.peek()?;
		self.pos += c.len_utf8();
		Some(c)
	}

	fn skip_ws(&mut self) {
		while self.peek().is_some_and(char::is_whitespace) {
			self.bump();
		}
	}

	fn error(&self, message: impl Into<String>) -> CfgError {
		syntax(self.token, self.offset + self.pos, message)
	}

	fn expect(&mut self, expected: char) -> Result<()> {
		match self.peek() {
			Some(c) if c == expected => {
				self.bump();
				Ok(())
			}
			Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
			None => Err(self.error(format!("expected '{expected}', found end of input"))),
		}
	}

	fn parse_element(&mut self) -> Result<Value> {
		self.skip_ws();
		match self.peek() {
			Some('[') => self.parse_seq(),
			Some('{') => self.parse_map(),
			Some('"' | '\'') => self.parse_quoted().map(Value::Str),
			Some(_) => {
				let word = self.parse_word(&[',', ']', '}'])?;
				Ok(classify(&word))
			}
			None => Err(self.error("expected a value, found end of input")),
		}
	}

	fn parse_seq(&mut self) -> Result<Value> {
		self.expect('[')?;
		let mut items = Vec::new();
		self.skip_ws();
		if self.peek() == Some(']') {
			self.bump();
			return Ok(Value::Seq(items));
		}
		loop {
			items.push(self.parse_element()?);
			self.skip_ws();
			match self.bump() {
				Some(',') => continue,
				Some(']') => return Ok(Value::Seq(items)),
				Some(c) => {
					self.pos -= c.len_utf8();
					return Err(self.error(format!("expected ',' or ']', found '{c}'")));
				}
				None => return Err(self.error("unterminated sequence")),
			}
		}
	}

	fn parse_map(&mut self) -> Result<Value> {
		self.expect('{')?;
		let mut node = ConfigNode::new();
		self.skip_ws();
		if self.peek() == Some('}') {
			self.bump();
			return Ok(Value::Map(node));
		}
		loop {
			self.skip_ws();
			let key = match self.peek() {
				Some('"' | '\'') => self.parse_quoted()?,
				_ => self.parse_word(&[':', ',', '}', '[', ']', '{'])?,
			};
			self.skip_ws();
			self.expect(':')?;
			let value = self.parse_element()?;
			node.insert(key, value);
			self.skip_ws();
			match self.bump() {
				Some(',') => continue,
				Some('}') => return Ok(Value::Map(node)),
				Some(c) => {
					self.pos -= c.len_utf8();
					return Err(self.error(format!("expected ',' or '}}', found '{c}'")));
				}
				None => return Err(self.error("unterminated mapping")),
			}
		}
	}

	fn parse_quoted(&mut self) -> Result<String> {
		let start = self.pos;
		let Some(quote) = self.bump() else {
			return Err(self.error("expected a quoted string"));
		};
		let mut out = String::new();
		loop {
			match self.bump() {
				Some(c) if c == quote => return Ok(out),
				Some('\\') => match self.bump() {
					Some('n') => out.push('\n'),
					Some('t') => out.push('\t'),
					Some(c) => out.push(c),
					None => break,
				},
				Some(c) => out.push(c),
				None => break,
			}
		}
		self.pos = start;
		Err(self.error("unterminated quoted string"))
	}

	/// Read an unquoted word up to one of `stops`, trimmed.
	fn parse_word(&mut self, stops: &[char]) -> Result<String> {
		let start = self.pos;
		while let Some(c) = self.peek() {
			if stops.contains(&c) || c == '"' || c == '\'' {
				break;
			}
			self.bump();
		}
		let word = self.src[start..self.pos].trim();
		if word.is_empty() {
			self.pos = start;
			return Err(self.error("expected a value"));
		}
		Ok(word.to_string())
	}
}

/// Interpret an unquoted primitive.
fn classify(word: &str) -> Value {
	match word {
		MISSING_LITERAL => return Value::Missing,
		"null" | "~" => return Value::Null,
		_ => {}
	}
	match word.to_ascii_lowercase().as_str() {
		"true" => return Value::Bool(true),
		"false" => return Value::Bool(false),
		"inf" | "+inf" => return Value::Float(f64::INFINITY),
		"-inf" => return Value::Float(f64::NEG_INFINITY),
		"nan" => return Value::Float(f64::NAN),
		_ => {}
	}
	if let Ok(i) = word.parse::<i64>() {
		return Value::Int(i);
	}
	if word.contains(['.', 'e', 'E'])
		&& let Ok(x) = word.parse::<f64>()
	{
		return Value::Float(x);
	}
	Value::Str(word.to_string())
}

fn syntax(token: &str, position: usize, message: impl Into<String>) -> CfgError {
	CfgError::OverrideSyntax {
		token: token.to_string(),
		position,
		message: message.into(),
	}
}
