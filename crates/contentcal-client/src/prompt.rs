//! Interactive prompts for values not given on the command line.
//!
//! Prompts are written to the supplied writer (stderr in the binary) so that
//! stdout carries only the spreadsheet URL.

use std::io::{BufRead, Write};

use contentcal_core::{
    ClientName, DEFAULT_CLIENT_NAME, DEFAULT_DURATION_WEEKS, MAX_DURATION_WEEKS, Weeks,
    parse_duration, validate_client_name,
};

use crate::error::ClientResult;

/// Asks for the client name. An empty answer selects the default name.
pub fn client_name<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> ClientResult<ClientName> {
    write!(output, "Client name (default: {}): ", DEFAULT_CLIENT_NAME)?;
    output.flush()?;

    let answer = read_answer(input)?;
    let name = if answer.is_empty() {
        DEFAULT_CLIENT_NAME
    } else {
        answer.as_str()
    };
    Ok(validate_client_name(name)?)
}

/// Asks for the planning horizon in weeks. An empty answer selects the default.
pub fn weeks<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> ClientResult<Weeks> {
    write!(
        output,
        "How many weeks ahead to plan? (1-{}, default: {}): ",
        MAX_DURATION_WEEKS, DEFAULT_DURATION_WEEKS
    )?;
    output.flush()?;

    let answer = read_answer(input)?;
    Ok(parse_duration(&answer)?)
}

/// Reads one line; end of input counts as an empty answer.
fn read_answer<R: BufRead>(input: &mut R) -> ClientResult<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::error::ClientError;

    use super::*;

    #[test]
    fn name_answer_is_validated() {
        let mut input = Cursor::new("  Acme Co  \n");
        let mut output = Vec::new();
        let name = client_name(&mut input, &mut output).unwrap();
        assert_eq!(name.as_str(), "Acme Co");
        assert!(String::from_utf8(output).unwrap().starts_with("Client name"));
    }

    #[test]
    fn empty_name_uses_default() {
        let mut output = Vec::new();
        let name = client_name(&mut Cursor::new("\n"), &mut output).unwrap();
        assert_eq!(name.as_str(), DEFAULT_CLIENT_NAME);

        let name = client_name(&mut Cursor::new(""), &mut output).unwrap();
        assert_eq!(name.as_str(), DEFAULT_CLIENT_NAME);
    }

    #[test]
    fn unusable_name_is_rejected() {
        let err = client_name(&mut Cursor::new("///\n"), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn weeks_answer() {
        let weeks = weeks(&mut Cursor::new("8\n"), &mut Vec::new()).unwrap();
        assert_eq!(weeks.get(), 8);
    }

    #[test]
    fn empty_weeks_uses_default() {
        let mut output = Vec::new();
        let weeks = weeks(&mut Cursor::new("\n"), &mut output).unwrap();
        assert_eq!(weeks.get(), DEFAULT_DURATION_WEEKS);
        assert!(String::from_utf8(output).unwrap().contains("default: 4"));
    }

    #[test]
    fn out_of_range_weeks_are_rejected() {
        for answer in ["0\n", "53\n", "-2\n", "four\n"] {
            let err = weeks(&mut Cursor::new(answer), &mut Vec::new()).unwrap_err();
            assert_eq!(err.exit_code(), 2, "answer {answer:?}");
        }
    }
}
