//! Tests for the pure turn validation rules.

use strum::IntoEnumIterator;
use xo_rules::rules::{self, LINES};
use xo_rules::{Board, Cell, Outcome, Position, Symbol};

fn board_with(cells: &[(usize, Symbol)]) -> Board {
    cells.iter().fold(Board::new(), |board, &(index, symbol)| {
        let pos = Position::from_index(index).expect("index in range");
        board.with_mark(pos, symbol)
    })
}

#[test]
fn test_every_line_wins_for_every_symbol() {
    for symbol in Symbol::iter() {
        for line in LINES {
            let board = board_with(&line.map(|i| (i, symbol)));
            assert_eq!(
                rules::winning_symbol(&board),
                Some(symbol),
                "line {:?} should win for {}",
                line,
                symbol
            );
            assert_eq!(rules::winning_line(&board), Some((symbol, line)));
        }
    }
}

#[test]
fn test_two_of_three_never_wins() {
    for line in LINES {
        let board = board_with(&[(line[0], Symbol::X), (line[1], Symbol::X), (line[2], Symbol::O)]);
        assert_eq!(rules::winning_symbol(&board), None, "line {:?}", line);
    }
}

#[test]
fn test_is_full_iff_all_cells_occupied() {
    let mut board = Board::new();
    let mut symbol = Symbol::X;
    for pos in Position::all() {
        assert!(!rules::is_full(&board));
        board = board.with_mark(pos, symbol);
        symbol = symbol.opponent();
    }
    assert!(rules::is_full(&board));
    assert!(board.cells().iter().all(|c| *c != Cell::Empty));
}

#[test]
fn test_full_board_without_line_is_draw() {
    let draws = ["XOX/OXX/OXO", "XXO/OOX/XOX", "OXO/XXO/XOX"];
    for layout in draws {
        let board: Board = layout.parse().expect("valid layout");
        assert_eq!(rules::winning_symbol(&board), None, "{}", layout);
        assert_eq!(rules::evaluate(&board), Some(Outcome::Draw), "{}", layout);
    }
}

#[test]
fn test_occupied_cells_report_occupied() {
    let board: Board = "X.O/.../...".parse().expect("valid layout");
    let occupied: Vec<usize> = Position::all()
        .filter(|pos| rules::is_cell_occupied(&board, *pos))
        .map(Position::index)
        .collect();
    assert_eq!(occupied, vec![0, 2]);
}

#[test]
fn test_board_serializes_as_flat_cells() {
    let board: Board = "X../.O./...".parse().expect("valid layout");
    let json = serde_json::to_value(board).expect("serialize");
    assert_eq!(
        json,
        serde_json::json!(["X", null, null, null, "O", null, null, null, null])
    );
}

#[test]
fn test_position_rejects_off_board_json() {
    let err = serde_json::from_str::<Position>(r#"{"row":3,"col":0}"#);
    assert!(err.is_err());
    let pos: Position = serde_json::from_str(r#"{"row":1,"col":2}"#).expect("on board");
    assert_eq!(pos.index(), 5);
}
