use crate::error::Result;
use crate::fixfen::FixFenTable;

/// FEN used when a record carries no FEN header
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Termination reasons that make a result meaningless for book statistics
pub const DISALLOWED_TERMINATIONS: [&str; 5] = [
    "time forfeit",
    "abandoned",
    "stalled connection",
    "illegal move",
    "unterminated",
];

/// Game result from White's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
    #[default]
    Unknown,
}

impl Outcome {
    /// Exact match on the PGN `Result` tag value
    pub fn from_result_tag(value: &str) -> Self {
        match value {
            "1-0" => Outcome::Win,
            "0-1" => Outcome::Loss,
            "1/2-1/2" => Outcome::Draw,
            _ => Outcome::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != Outcome::Unknown
    }
}

/// What the record parser reports, in order, for each game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEvent<'a> {
    Begin,
    Header { key: &'a str, value: &'a str },
    /// Header section finished, movetext follows
    MovesStart,
    End,
}

/// Reply to the parser after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// Skip the remaining movetext of the current record
    SkipMoves,
}

/// Receives one labeled position per counted game
pub trait PositionSink {
    fn accept(&mut self, position: &str, outcome: Outcome) -> Result<()>;
}

impl PositionSink for Vec<(String, Outcome)> {
    fn accept(&mut self, position: &str, outcome: Outcome) -> Result<()> {
        self.push((position.to_string(), outcome));
        Ok(())
    }
}

#[derive(Debug)]
struct RecordState {
    outcome: Outcome,
    fen: String,
    valid: bool,
}

impl Default for RecordState {
    fn default() -> Self {
        Self {
            outcome: Outcome::Unknown,
            fen: STARTPOS_FEN.to_string(),
            valid: true,
        }
    }
}

/// Per-record state machine that turns parser events into labeled positions.
///
/// State is reset on `Begin`. On `MovesStart` a valid game with a known
/// result is handed to the sink, after the optional move counter fix-up, and
/// the parser is told to skip the movetext.
pub struct RecordHandler<'a, S> {
    sink: S,
    fixfen: Option<&'a FixFenTable>,
    state: RecordState,
}

impl<'a, S: PositionSink> RecordHandler<'a, S> {
    pub fn new(sink: S, fixfen: Option<&'a FixFenTable>) -> Self {
        Self {
            sink,
            fixfen,
            state: RecordState::default(),
        }
    }

    pub fn handle(&mut self, event: RecordEvent<'_>) -> Result<Control> {
        match event {
            RecordEvent::Begin => {
                self.state = RecordState::default();
                Ok(Control::Continue)
            }
            RecordEvent::Header { key, value } => {
                match key {
                    "Result" => self.state.outcome = Outcome::from_result_tag(value),
                    "FEN" => value.clone_into(&mut self.state.fen),
                    "Termination" if DISALLOWED_TERMINATIONS.iter().any(|r| *r == value) => {
                        self.state.valid = false;
                    }
                    _ => {}
                }
                Ok(Control::Continue)
            }
            RecordEvent::MovesStart => {
                if self.state.outcome.is_known() && self.state.valid {
                    let position = match self.fixfen {
                        Some(table) => table.fix(&self.state.fen)?,
                        None => self.state.fen.as_str().into(),
                    };
                    self.sink.accept(&position, self.state.outcome)?;
                }
                Ok(Control::SkipMoves)
            }
            RecordEvent::End => Ok(Control::Continue),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyzeError;
    use std::io::Cursor;

    const ITALIAN: &str = "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3";

    fn feed(
        handler: &mut RecordHandler<'_, Vec<(String, Outcome)>>,
        headers: &[(&str, &str)],
    ) -> Control {
        handler.handle(RecordEvent::Begin).unwrap();
        for &(key, value) in headers {
            handler.handle(RecordEvent::Header { key, value }).unwrap();
        }
        let control = handler.handle(RecordEvent::MovesStart).unwrap();
        handler.handle(RecordEvent::End).unwrap();
        control
    }

    #[test]
    fn test_result_mapping() {
        assert_eq!(Outcome::from_result_tag("1-0"), Outcome::Win);
        assert_eq!(Outcome::from_result_tag("0-1"), Outcome::Loss);
        assert_eq!(Outcome::from_result_tag("1/2-1/2"), Outcome::Draw);
        assert_eq!(Outcome::from_result_tag("*"), Outcome::Unknown);
        assert_eq!(Outcome::from_result_tag("1-0 "), Outcome::Unknown);
    }

    #[test]
    fn test_counted_game_uses_fen_header() {
        let mut handler = RecordHandler::new(Vec::new(), None);
        let control = feed(&mut handler, &[("Result", "0-1"), ("FEN", ITALIAN)]);
        assert_eq!(control, Control::SkipMoves);
        assert_eq!(handler.sink(), &vec![(ITALIAN.to_string(), Outcome::Loss)]);
    }

    #[test]
    fn test_missing_fen_falls_back_to_startpos() {
        let mut handler = RecordHandler::new(Vec::new(), None);
        feed(&mut handler, &[("Result", "1/2-1/2")]);
        assert_eq!(
            handler.into_sink(),
            vec![(STARTPOS_FEN.to_string(), Outcome::Draw)]
        );
    }

    #[test]
    fn test_unknown_result_contributes_nothing() {
        let mut handler = RecordHandler::new(Vec::new(), None);
        let control = feed(&mut handler, &[("Result", "*"), ("FEN", ITALIAN)]);
        assert_eq!(control, Control::SkipMoves);
        assert!(handler.sink().is_empty());
    }

    #[test]
    fn test_disallowed_termination() {
        let mut handler = RecordHandler::new(Vec::new(), None);
        for reason in DISALLOWED_TERMINATIONS {
            feed(&mut handler, &[("Result", "1-0"), ("Termination", reason)]);
        }
        assert!(handler.sink().is_empty());

        feed(&mut handler, &[("Result", "1-0"), ("Termination", "adjudication")]);
        assert_eq!(handler.sink().len(), 1);
    }

    #[test]
    fn test_state_resets_between_records() {
        let mut handler = RecordHandler::new(Vec::new(), None);
        feed(
            &mut handler,
            &[("Result", "1-0"), ("FEN", ITALIAN), ("Termination", "abandoned")],
        );
        feed(&mut handler, &[("Result", "1-0")]);
        assert_eq!(
            handler.into_sink(),
            vec![(STARTPOS_FEN.to_string(), Outcome::Win)]
        );
    }

    #[test]
    fn test_fixfen_applied_before_sink() {
        let table = FixFenTable::from_reader(Cursor::new(format!("{ITALIAN}\n"))).unwrap();
        let reset = ITALIAN.replace(" 3 3", " 0 1");

        let mut handler = RecordHandler::new(Vec::new(), Some(&table));
        feed(&mut handler, &[("Result", "1-0"), ("FEN", reset.as_str())]);
        assert_eq!(handler.into_sink(), vec![(ITALIAN.to_string(), Outcome::Win)]);
    }

    #[test]
    fn test_fixfen_miss_surfaces_error() {
        let table = FixFenTable::from_reader(Cursor::new(format!("{ITALIAN}\n"))).unwrap();
        let mut handler = RecordHandler::new(Vec::new(), Some(&table));
        handler.handle(RecordEvent::Begin).unwrap();
        handler
            .handle(RecordEvent::Header {
                key: "Result",
                value: "1-0",
            })
            .unwrap();

        let result = handler.handle(RecordEvent::MovesStart);
        assert!(matches!(result, Err(AnalyzeError::MissingFixFen { .. })));
    }
}
