use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{digit1, multispace0, multispace1},
    combinator::{map_res, opt},
    sequence::preceded,
    IResult,
};

/// Commands understood by the interactive client.
#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Epochs { limit: Option<usize>, offset: Option<usize> },
    Get { epoch: String },
    Speed { epoch: String },
    Location { epoch: String },
    Now,
    Help,
    Exit,
}

// --- BASIC PARSERS ---

fn parse_usize(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}

/// An epoch key: anything up to whitespace ("2025-047T12:00:00.000Z").
fn parse_epoch_token(input: &str) -> IResult<&str, String> {
    let (input, token) = take_while1(|c: char| !c.is_whitespace())(input)?;
    Ok((input, token.to_string()))
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    nom::sequence::delimited(multispace0, inner, multispace0)
}

// --- COMMAND PARSERS ---

fn parse_epochs(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_no_case("EPOCHS")(input)?;
    let (input, limit) = opt(preceded(ws(tag_no_case("LIMIT")), parse_usize))(input)?;
    let (input, offset) = opt(preceded(ws(tag_no_case("OFFSET")), parse_usize))(input)?;
    Ok((input, Command::Epochs { limit, offset }))
}

fn parse_get(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_no_case("GET")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, epoch) = parse_epoch_token(input)?;
    Ok((input, Command::Get { epoch }))
}

fn parse_speed(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_no_case("SPEED")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, epoch) = parse_epoch_token(input)?;
    Ok((input, Command::Speed { epoch }))
}

fn parse_location(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_no_case("LOCATION")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, epoch) = parse_epoch_token(input)?;
    Ok((input, Command::Location { epoch }))
}

fn parse_now(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_no_case("NOW")(input)?;
    Ok((input, Command::Now))
}

fn parse_help(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_no_case("HELP")(input)?;
    Ok((input, Command::Help))
}

fn parse_exit(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_no_case("EXIT"), tag_no_case("QUIT")))(input)?;
    Ok((input, Command::Exit))
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_epochs,
        parse_get,
        parse_speed,
        parse_location,
        parse_now,
        parse_help,
        parse_exit,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder.trim()));
            }
            Ok(cmd)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context = if e.input.len() > 20 {
                format!("{}...", &e.input[..20])
            } else {
                e.input.to_string()
            };
            Err(format!("Invalid syntax near: '{}'", context))
        }
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}
