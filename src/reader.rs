use crate::error::{LispError, LispResult};
use crate::heap::Heap;
use crate::stream::CharSource;
use crate::strings::StringPool;
use crate::symbol::{sym, SymbolTable};
use crate::value::{SymbolId, Value};

/// Recursive-descent reader: parses source text into values.
pub struct Reader<'a, S: CharSource> {
    source: &'a mut S,
    heap: &'a mut Heap,
    symbols: &'a mut SymbolTable,
    strings: &'a mut StringPool,
}

/// What can appear between the parens of a list.
enum Element {
    Value(Value),
    Dot,
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

/// Bytes that end a symbol token.
fn is_delimiter(ch: u8) -> bool {
    is_whitespace(ch) || matches!(ch, b'(' | b')' | b'"' | b';' | b'\'')
}

fn hex_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

impl<'a, S: CharSource> Reader<'a, S> {
    pub fn new(
        source: &'a mut S,
        heap: &'a mut Heap,
        symbols: &'a mut SymbolTable,
        strings: &'a mut StringPool,
    ) -> Self {
        Reader {
            source,
            heap,
            symbols,
            strings,
        }
    }

    /// Read one expression. Returns None at end of input.
    pub fn read(&mut self) -> LispResult<Option<Value>> {
        self.skip_whitespace_and_comments()?;
        if self.source.at_end()? {
            return Ok(None);
        }
        let val = self.read_expr()?;
        Ok(Some(val))
    }

    /// Read all expressions from input.
    pub fn read_all(&mut self) -> LispResult<Vec<Value>> {
        let mut results = Vec::new();
        while let Some(val) = self.read()? {
            results.push(val);
        }
        Ok(results)
    }

    fn skip_whitespace_and_comments(&mut self) -> LispResult<()> {
        while let Some(ch) = self.source.peek()? {
            if is_whitespace(ch) {
                self.source.advance()?;
            } else if ch == b';' {
                while let Some(c) = self.source.advance()? {
                    if c == b'\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn read_expr(&mut self) -> LispResult<Value> {
        match self.read_element()? {
            Element::Value(val) => Ok(val),
            Element::Dot => Err(LispError::Syntax("unexpected '.'".into())),
        }
    }

    fn read_element(&mut self) -> LispResult<Element> {
        self.skip_whitespace_and_comments()?;

        let ch = self
            .source
            .peek()?
            .ok_or_else(|| LispError::Syntax("unexpected end of input".into()))?;

        let val = match ch {
            b'(' => self.read_list()?,
            b')' => return Err(LispError::Syntax("unexpected ')'".into())),
            b'\'' => self.read_wrapped(sym::QUOTE)?,
            b'`' => self.read_wrapped(sym::BACKQUOTE)?,
            b',' => self.read_comma()?,
            b'"' => self.read_string()?,
            _ => return self.read_word(),
        };
        Ok(Element::Value(val))
    }

    /// Read a list: (a b c) or (a . b) or (a b . c)
    fn read_list(&mut self) -> LispResult<Value> {
        self.source.advance()?; // consume '('

        let mut elements = Vec::new();
        let mut dot_tail = None;

        loop {
            self.skip_whitespace_and_comments()?;

            match self.source.peek()? {
                None => return Err(LispError::Syntax("unterminated list".into())),
                Some(b')') => {
                    self.source.advance()?;
                    break;
                }
                Some(_) => {}
            }

            match self.read_element()? {
                Element::Value(val) => elements.push(val),
                Element::Dot => {
                    if elements.is_empty() {
                        return Err(LispError::Syntax("'.' at start of list".into()));
                    }
                    dot_tail = Some(self.read_expr()?);
                    self.skip_whitespace_and_comments()?;
                    if self.source.advance()? != Some(b')') {
                        return Err(LispError::Syntax("expected ')' after dotted tail".into()));
                    }
                    break;
                }
            }
        }

        self.heap
            .list_with_tail(&elements, dot_tail.unwrap_or(Value::Nil))
    }

    /// Read a prefixed form: 'x -> (quote x), `x -> (backquote x).
    fn read_wrapped(&mut self, marker: SymbolId) -> LispResult<Value> {
        self.source.advance()?; // consume the prefix
        let expr = self.read_expr()?;
        self.heap.list(&[Value::Symbol(marker), expr])
    }

    /// ,x -> (unquote x), ,@x -> (unquote-splicing x)
    fn read_comma(&mut self) -> LispResult<Value> {
        self.source.advance()?; // consume ','
        let marker = if self.source.peek()? == Some(b'@') {
            self.source.advance()?;
            sym::UNQUOTE_SPLICING
        } else {
            sym::UNQUOTE
        };
        let expr = self.read_expr()?;
        self.heap.list(&[Value::Symbol(marker), expr])
    }

    /// Read a string literal: "hello\n"
    fn read_string(&mut self) -> LispResult<Value> {
        self.source.advance()?; // consume opening '"'
        let mut bytes = Vec::new();
        loop {
            match self.next_in_string()? {
                b'"' => break,
                b'\\' => {
                    let escaped = match self.next_in_string()? {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'x' => {
                            let hi = self.next_in_string()?;
                            let lo = self.next_in_string()?;
                            match (hex_value(hi), hex_value(lo)) {
                                (Some(hi), Some(lo)) => (hi << 4) | lo,
                                _ => {
                                    return Err(LispError::Syntax(format!(
                                        "invalid hex escape \\x{}{}",
                                        hi as char, lo as char
                                    )))
                                }
                            }
                        }
                        other => other,
                    };
                    bytes.push(escaped);
                }
                ch => bytes.push(ch),
            }
        }
        let id = self.strings.alloc(&bytes)?;
        Ok(Value::Str(id))
    }

    fn next_in_string(&mut self) -> LispResult<u8> {
        self.source
            .advance()?
            .ok_or_else(|| LispError::Syntax("unterminated string".into()))
    }

    /// Read a symbol token. A lone "." is the dotted-pair marker and "nil"
    /// reads as the empty list.
    fn read_word(&mut self) -> LispResult<Element> {
        let mut bytes = Vec::new();
        while let Some(ch) = self.source.peek()? {
            if is_delimiter(ch) {
                break;
            }
            bytes.push(ch);
            self.source.advance()?;
        }
        let word = String::from_utf8(bytes).map_err(|e| {
            LispError::Syntax(format!(
                "symbol {:?} is not valid UTF-8",
                String::from_utf8_lossy(e.as_bytes())
            ))
        })?;
        let val = match word.as_str() {
            "." => return Ok(Element::Dot),
            "nil" => Value::Nil,
            name => Value::Symbol(self.symbols.intern(name)?),
        };
        Ok(Element::Value(val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StrSource;

    struct Arenas {
        heap: Heap,
        symbols: SymbolTable,
        strings: StringPool,
    }

    impl Arenas {
        fn new() -> Self {
            Arenas {
                heap: Heap::new(None),
                symbols: SymbolTable::new(None),
                strings: StringPool::new(None),
            }
        }

        fn read_all(&mut self, src: &str) -> LispResult<Vec<Value>> {
            let mut source = StrSource::new(src);
            Reader::new(&mut source, &mut self.heap, &mut self.symbols, &mut self.strings)
                .read_all()
        }

        fn read_one(&mut self, src: &str) -> Value {
            let vals = self.read_all(src).unwrap();
            assert_eq!(vals.len(), 1, "expected one form in {:?}", src);
            vals[0]
        }

        fn sym(&mut self, name: &str) -> Value {
            Value::Symbol(self.symbols.intern(name).unwrap())
        }
    }

    #[test]
    fn empty_input_reads_nothing() {
        let mut a = Arenas::new();
        assert!(a.read_all("").unwrap().is_empty());
        assert!(a.read_all("  ; just a comment\n\t").unwrap().is_empty());
    }

    #[test]
    fn symbols_are_interned() {
        let mut a = Arenas::new();
        let vals = a.read_all("foo foo bar").unwrap();
        assert_eq!(vals[0], vals[1]);
        assert_ne!(vals[0], vals[2]);
        assert_eq!(a.read_one("nil"), Value::Nil);
        assert_eq!(a.read_one("()"), Value::Nil);
    }

    #[test]
    fn lists_and_dotted_pairs() {
        let mut a = Arenas::new();
        let list = a.read_one("(a (b) c)");
        assert_eq!(a.heap.list_len(list), 3);

        let pair = a.read_one("(a . b)");
        let id = pair.as_pair().unwrap();
        let (sa, sb) = (a.sym("a"), a.sym("b"));
        assert_eq!(a.heap.car(id), sa);
        assert_eq!(a.heap.cdr(id), sb);

        let dotted = a.read_one("(a b . c)");
        assert!(!a.heap.is_proper_list(dotted));
        assert_eq!(a.heap.list_len(dotted), 2);
    }

    #[test]
    fn dot_inside_a_word_is_part_of_the_symbol() {
        let mut a = Arenas::new();
        let val = a.read_one("(a.b ...)");
        let items = a.heap.list_to_vec(val).unwrap();
        assert_eq!(a.symbols.name(items[0].as_symbol().unwrap()), "a.b");
        assert_eq!(a.symbols.name(items[1].as_symbol().unwrap()), "...");
    }

    #[test]
    fn misplaced_dots_are_rejected() {
        let mut a = Arenas::new();
        for src in [".", "(. a)", "(a . b c)", "(a . )", "'."] {
            assert!(
                matches!(a.read_all(src), Err(LispError::Syntax(_))),
                "{:?} should not parse",
                src
            );
        }
    }

    #[test]
    fn quote_sugar_expands() {
        let mut a = Arenas::new();
        for (src, marker) in [
            ("'x", sym::QUOTE),
            ("`x", sym::BACKQUOTE),
            (",x", sym::UNQUOTE),
            (",@x", sym::UNQUOTE_SPLICING),
        ] {
            let val = a.read_one(src);
            let items = a.heap.list_to_vec(val).unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(items[0], Value::Symbol(marker));
            assert_eq!(items[1], a.sym("x"));
        }
    }

    #[test]
    fn quote_ends_a_word() {
        let mut a = Arenas::new();
        let vals = a.read_all("a'b").unwrap();
        assert_eq!(vals.len(), 2);
        assert_eq!(vals[0], a.sym("a"));
    }

    #[test]
    fn string_escapes() {
        let mut a = Arenas::new();
        let val = a.read_one(r#""a\nb\t\x1b\"\\\q""#);
        let id = val.as_string().unwrap();
        assert_eq!(a.strings.bytes(id), b"a\nb\t\x1b\"\\q");
    }

    #[test]
    fn bad_strings_are_syntax_errors() {
        let mut a = Arenas::new();
        assert!(matches!(a.read_all("\"open"), Err(LispError::Syntax(_))));
        assert!(matches!(a.read_all(r#""\x4""#), Err(LispError::Syntax(_))));
        assert!(matches!(a.read_all(r#""\xzz""#), Err(LispError::Syntax(_))));
    }

    #[test]
    fn unbalanced_parens_are_syntax_errors() {
        let mut a = Arenas::new();
        assert!(matches!(a.read_all("(a b"), Err(LispError::Syntax(_))));
        assert!(matches!(a.read_all(")"), Err(LispError::Syntax(_))));
        assert!(matches!(a.read_all("'"), Err(LispError::Syntax(_))));
    }

    #[test]
    fn comments_are_skipped_inside_lists() {
        let mut a = Arenas::new();
        let val = a.read_one("(a ; first\n b)");
        assert_eq!(a.heap.list_len(val), 2);
    }
}
