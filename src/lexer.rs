//! Splitting a single command string into words.
//!
//! Words are found by whitespace splitting first; quotes are then resolved
//! per word, so a quoted phrase that spans several whitespace-separated words
//! is glued back into one token.

/// One word of a command.
pub type Token = String;

/// The words of one command; the first one is the command name.
pub type TokenizedCommand = Vec<Token>;

/// Quote characters recognised by the tokenizer and the command splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    Single,
    Double,
}

impl Quote {
    pub fn from_char(ch: char) -> Option<Self> {
        match ch {
            '\'' => Some(Quote::Single),
            '"' => Some(Quote::Double),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Quote::Single => '\'',
            Quote::Double => '"',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    /// Every word becomes its own token.
    Outside,
    /// Words are appended to the last token until one ends with the quote.
    Quoted(Quote),
}

struct Tokenizer {
    state: LexingState,
    tokens: TokenizedCommand,
}

impl Tokenizer {
    fn new() -> Self {
        Tokenizer {
            state: LexingState::Outside,
            tokens: Vec::new(),
        }
    }

    /// Feeds one whitespace-delimited word through the state machine.
    fn push_word(&mut self, word: &str) {
        self.state = match self.state {
            LexingState::Outside => self.handle_outside(word),
            LexingState::Quoted(quote) => self.handle_quoted(word, quote),
        };
    }

    fn handle_outside(&mut self, word: &str) -> LexingState {
        let Some((pos, quote)) = word
            .char_indices()
            .find_map(|(pos, ch)| Quote::from_char(ch).map(|q| (pos, q)))
        else {
            self.tokens.push(word.to_string());
            return LexingState::Outside;
        };

        let mut token = String::with_capacity(word.len());
        token.push_str(&word[..pos]);
        token.push_str(&word[pos + 1..]);

        if token.ends_with(quote.as_char()) {
            // Quote opens and closes inside the same word.
            token.pop();
            self.tokens.push(token);
            LexingState::Outside
        } else {
            self.tokens.push(token);
            LexingState::Quoted(quote)
        }
    }

    fn handle_quoted(&mut self, word: &str, quote: Quote) -> LexingState {
        let (word, closes) = match word.strip_suffix(quote.as_char()) {
            Some(stripped) => (stripped, true),
            None => (word, false),
        };
        // Quoted state is only entered after a token has been pushed.
        if let Some(last) = self.tokens.last_mut() {
            last.push(' ');
            last.push_str(word);
        }
        if closes {
            LexingState::Outside
        } else {
            LexingState::Quoted(quote)
        }
    }
}

/// Splits a command string into tokens.
///
/// A word containing `'` or `"` opens a quoted token: the quote character is
/// dropped and following words are joined to it with single spaces until a
/// word ending in the same quote character is seen. An unterminated quote
/// swallows the rest of the command.
pub fn tokenize(command: &str) -> TokenizedCommand {
    let mut tokenizer = Tokenizer::new();
    for word in command.split_whitespace() {
        tokenizer.push_word(word);
    }
    tokenizer.tokens
}
