//! Placeholder templates.
//!
//! A string attribute value may embed references to other attributes or to
//! the extras:
//!
//! | Syntax             | Meaning                                          |
//! |--------------------|--------------------------------------------------|
//! | `[name]`           | value of `name`                                  |
//! | `[name:member]`    | member `member` of the value of `name`           |
//! | `[name::member]`   | same as above                                    |
//! | `[name#text]`      | `text` when `name` is known nowhere              |
//! | `[name%03d]`       | value of `name` rendered with a format spec       |
//!
//! Flags combine in that order: `[term:hour%02d]`, `[geometry#global]`.
//!
//! A string is parsed once per substitution pass into a list of [`Piece`]s.
//! The resolver evaluates the first reference of the pass, renders the pieces
//! back into a string and parses the result again, since a substituted value
//! may itself carry placeholders.

use crate::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Reference {
    pub name: String,
    pub member: Option<String>,
    pub fallback: Option<String>,
    pub format: Option<String>,
    /// Source text, e.g. `[model:upper]`.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Piece {
    Text(String),
    Ref(Reference),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(text: &str) -> Self {
        let re = regex!(r"\[(\w+)(?::+(\w+))?(?:#(\w+))?(?:%([\w.<>^+\-]+))?\]");
        let mut pieces = Vec::new();
        let mut last = 0;
        for caps in re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                pieces.push(Piece::Text(text[last..whole.start()].to_string()));
            }
            let group = |idx: usize| caps.get(idx).map(|m| m.as_str().to_string());
            pieces.push(Piece::Ref(Reference {
                name: caps[1].to_string(),
                member: group(2),
                fallback: group(3),
                format: group(4),
                raw: whole.as_str().to_string(),
            }));
            last = whole.end();
        }
        if last < text.len() {
            pieces.push(Piece::Text(text[last..].to_string()));
        }
        Template { pieces }
    }

    pub fn has_refs(&self) -> bool {
        self.pieces.iter().any(|p| matches!(p, Piece::Ref(_)))
    }

    /// The reference, when the whole template is one bare reference.
    pub fn single(&self) -> Option<&Reference> {
        match self.pieces.as_slice() {
            [Piece::Ref(r)] => Some(r),
            _ => None,
        }
    }

    pub fn refs(&self) -> impl Iterator<Item = &Reference> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Ref(r) => Some(r),
            Piece::Text(_) => None,
        })
    }

    /// Render the template, asking `eval` for the text of each reference.
    ///
    /// `eval` returning `Ok(None)` leaves the reference untouched.
    pub fn render<E>(&self, mut eval: impl FnMut(&Reference) -> Result<Option<String>, E>) -> Result<String, E> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(t) => out.push_str(t),
                Piece::Ref(r) => match eval(r)? {
                    Some(text) => out.push_str(&text),
                    None => out.push_str(&r.raw),
                },
            }
        }
        Ok(out)
    }

    /// Render the template, replacing only its first reference.
    pub fn render_first<E>(&self, eval: impl FnOnce(&Reference) -> Result<String, E>) -> Result<String, E> {
        let mut eval = Some(eval);
        self.render(|r| eval.take().map(|f| f(r)).transpose())
    }
}

// --- Format specs -----------------------------------------------------------------

/// A printf-like spec: `[[fill]align][+][0][width][.precision][type]`.
///
/// Types: `d` (int), `f`/`e` (float), `x`/`X`/`o`/`b` (int), `s` (any).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FormatSpec {
    fill: char,
    align: Option<char>,
    plus: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    pub fn parse(spec: &str) -> Result<Self, String> {
        let chars: Vec<char> = spec.chars().collect();
        let mut fs = FormatSpec { fill: ' ', align: None, plus: false, zero: false, width: 0, precision: None, kind: None };
        let mut i = 0;

        let is_align = |c: char| matches!(c, '<' | '>' | '^');
        if chars.len() >= 2 && is_align(chars[1]) {
            fs.fill = chars[0];
            fs.align = Some(chars[1]);
            i = 2;
        } else if chars.first().copied().is_some_and(is_align) {
            fs.align = Some(chars[0]);
            i = 1;
        }
        if chars.get(i) == Some(&'+') {
            fs.plus = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            fs.zero = true;
            i += 1;
        }
        let start = i;
        while chars.get(i).is_some_and(char::is_ascii_digit) {
            i += 1;
        }
        if i > start {
            fs.width = chars[start..i].iter().collect::<String>().parse().map_err(|_| "width overflow".to_string())?;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(char::is_ascii_digit) {
                i += 1;
            }
            if i == start {
                return Err("missing precision".to_string());
            }
            let digits: String = chars[start..i].iter().collect();
            fs.precision = Some(digits.parse().map_err(|_| "precision overflow".to_string())?);
        }
        match chars.get(i) {
            None => {}
            Some(&c @ ('d' | 'f' | 'e' | 'x' | 'X' | 'o' | 'b' | 's')) => {
                fs.kind = Some(c);
                i += 1;
            }
            Some(c) => return Err(format!("unknown format type `{c}`")),
        }
        if i != chars.len() {
            return Err("trailing characters".to_string());
        }
        Ok(fs)
    }

    pub fn apply(&self, value: &Value) -> Result<String, String> {
        let (sign, body, numeric) = match (self.kind, value) {
            (Some('d'), Value::Int(n)) => (sign(*n < 0, self.plus), n.unsigned_abs().to_string(), true),
            (Some('x'), Value::Int(n)) => (sign(*n < 0, self.plus), format!("{:x}", n.unsigned_abs()), true),
            (Some('X'), Value::Int(n)) => (sign(*n < 0, self.plus), format!("{:X}", n.unsigned_abs()), true),
            (Some('o'), Value::Int(n)) => (sign(*n < 0, self.plus), format!("{:o}", n.unsigned_abs()), true),
            (Some('b'), Value::Int(n)) => (sign(*n < 0, self.plus), format!("{:b}", n.unsigned_abs()), true),
            (Some(k @ ('f' | 'e')), Value::Int(_) | Value::Float(_)) => {
                let x = value.as_float().unwrap_or_default();
                let prec = self.precision.unwrap_or(6);
                let body = if k == 'f' { format!("{:.*}", prec, x.abs()) } else { format!("{:.*e}", prec, x.abs()) };
                (sign(x.is_sign_negative() && x != 0.0, self.plus), body, true)
            }
            (None, Value::Int(_) | Value::Float(_)) if self.precision.is_none() => {
                let text = value.to_string();
                match text.strip_prefix('-') {
                    Some(rest) => ("-", rest.to_string(), true),
                    None => (sign(false, self.plus), text, true),
                }
            }
            (None | Some('s'), v) => {
                if self.plus || self.zero && !matches!(v, Value::Int(_) | Value::Float(_)) {
                    return Err(format!("sign or zero padding not allowed with {} values", v.type_name()));
                }
                let mut text = v.to_string();
                if let Some(prec) = self.precision {
                    text = text.chars().take(prec).collect();
                }
                ("", text, false)
            }
            (Some(k), v) => return Err(format!("format `{k}` does not apply to {} `{v}`", v.type_name())),
        };

        let len = sign.chars().count() + body.chars().count();
        if len >= self.width {
            return Ok(format!("{sign}{body}"));
        }
        let pad = self.width - len;
        if self.zero && self.align.is_none() && numeric {
            return Ok(format!("{sign}{}{body}", "0".repeat(pad)));
        }
        let fill = if self.zero && self.align.is_none() { '0' } else { self.fill };
        let align = self.align.unwrap_or(if numeric { '>' } else { '<' });
        let run = |n: usize| std::iter::repeat_n(fill, n).collect::<String>();
        Ok(match align {
            '<' => format!("{sign}{body}{}", run(pad)),
            '^' => format!("{}{sign}{body}{}", run(pad / 2), run(pad - pad / 2)),
            _ => format!("{}{sign}{body}", run(pad)),
        })
    }
}

fn sign(negative: bool, plus: bool) -> &'static str {
    match (negative, plus) {
        (true, _) => "-",
        (false, true) => "+",
        (false, false) => "",
    }
}
