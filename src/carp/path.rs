//! SVG path data, the subset the map overlays are drawn with.
//!
//! Supported commands: `M`/`m`, `L`/`l`, `C`/`c` and `Z`/`z`, including
//! implicit repetition (extra coordinate pairs after a move are line-tos).
//! Parsed paths are stored in absolute coordinates.

use anyhow::{anyhow, bail, Result};
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn offset(self, by: Point) -> Point {
        Point::new(self.x + by.x, self.y + by.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Segment {
    MoveTo(Point),
    LineTo(Point),
    CubicTo(Point, Point, Point),
    Close,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathData {
    segments: Vec<Segment>,
}

#[derive(Debug)]
enum Token<'a> {
    Command(char),
    Number(&'a str),
}

fn tokens(data: &str) -> impl Iterator<Item = Token<'_>> {
    static TOKEN_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = TOKEN_RE.get_or_init(|| {
        regex::Regex::new(r"[A-Za-z]|[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?")
            .expect("path token regex is valid")
    });
    re.find_iter(data).map(|m| {
        let text = m.as_str();
        match text.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => Token::Command(c),
            _ => Token::Number(text),
        }
    })
}

impl PathData {
    pub fn parse(data: &str) -> Result<Self> {
        let mut numbers: Vec<f32> = Vec::new();
        let mut groups: Vec<(char, Vec<f32>)> = Vec::new();
        let mut command: Option<char> = None;

        for token in tokens(data) {
            match token {
                Token::Command(c) => {
                    if let Some(previous) = command.take() {
                        groups.push((previous, std::mem::take(&mut numbers)));
                    }
                    command = Some(c);
                }
                Token::Number(text) => {
                    if command.is_none() {
                        bail!("path data must start with a command, found '{}'", text);
                    }
                    numbers.push(
                        text.parse()
                            .map_err(|e| anyhow!("bad number '{}' in path data: {}", text, e))?,
                    );
                }
            }
        }
        if let Some(last) = command {
            groups.push((last, numbers));
        }

        let mut segments = Vec::new();
        let mut current = Point::new(0.0, 0.0);
        let mut start = current;

        for (command, args) in groups {
            let relative = command.is_ascii_lowercase();
            let base = |current: Point, p: Point| if relative { current.offset(p) } else { p };

            match command.to_ascii_uppercase() {
                'M' => {
                    for (i, chunk) in pairs(command, &args, 2)?.enumerate() {
                        let point = base(current, Point::new(chunk[0], chunk[1]));
                        if i == 0 {
                            segments.push(Segment::MoveTo(point));
                            start = point;
                        } else {
                            segments.push(Segment::LineTo(point));
                        }
                        current = point;
                    }
                }
                'L' => {
                    for chunk in pairs(command, &args, 2)? {
                        let point = base(current, Point::new(chunk[0], chunk[1]));
                        segments.push(Segment::LineTo(point));
                        current = point;
                    }
                }
                'C' => {
                    for chunk in pairs(command, &args, 6)? {
                        let c1 = base(current, Point::new(chunk[0], chunk[1]));
                        let c2 = base(current, Point::new(chunk[2], chunk[3]));
                        let end = base(current, Point::new(chunk[4], chunk[5]));
                        segments.push(Segment::CubicTo(c1, c2, end));
                        current = end;
                    }
                }
                'Z' => {
                    if !args.is_empty() {
                        bail!("'{}' takes no arguments", command);
                    }
                    segments.push(Segment::Close);
                    current = start;
                }
                other => bail!("unsupported path command '{}'", other),
            }
        }

        if !matches!(segments.first(), Some(Segment::MoveTo(_))) {
            bail!("path data must begin with a move");
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn to_skia(&self) -> Option<tiny_skia::Path> {
        let mut builder = tiny_skia::PathBuilder::new();
        for segment in &self.segments {
            match *segment {
                Segment::MoveTo(p) => builder.move_to(p.x, p.y),
                Segment::LineTo(p) => builder.line_to(p.x, p.y),
                Segment::CubicTo(c1, c2, p) => builder.cubic_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y),
                Segment::Close => builder.close(),
            }
        }
        builder.finish()
    }
}

fn pairs<'a>(command: char, args: &'a [f32], arity: usize) -> Result<std::slice::ChunksExact<'a, f32>> {
    if args.is_empty() || args.len() % arity != 0 {
        bail!(
            "'{}' needs a multiple of {} numbers, got {}",
            command,
            arity,
            args.len()
        );
    }
    Ok(args.chunks_exact(arity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_cubics_accumulate_from_the_current_point() -> Result<()> {
        let path = PathData::parse("m 10,20 c 1,1 2,2 3,3 1,0 2,0 4,0")?;
        assert_eq!(
            path.segments(),
            &[
                Segment::MoveTo(Point::new(10.0, 20.0)),
                Segment::CubicTo(
                    Point::new(11.0, 21.0),
                    Point::new(12.0, 22.0),
                    Point::new(13.0, 23.0)
                ),
                Segment::CubicTo(
                    Point::new(14.0, 23.0),
                    Point::new(15.0, 23.0),
                    Point::new(17.0, 23.0)
                ),
            ]
        );
        Ok(())
    }

    #[test]
    fn extra_move_pairs_become_lines() -> Result<()> {
        let path = PathData::parse("M 0 0 5 5 l 1,-1 z")?;
        assert_eq!(
            path.segments(),
            &[
                Segment::MoveTo(Point::new(0.0, 0.0)),
                Segment::LineTo(Point::new(5.0, 5.0)),
                Segment::LineTo(Point::new(6.0, 4.0)),
                Segment::Close,
            ]
        );
        Ok(())
    }

    #[test]
    fn exponents_and_signs_parse() -> Result<()> {
        let path = PathData::parse("M1e1,-.5")?;
        assert_eq!(path.segments(), &[Segment::MoveTo(Point::new(10.0, -0.5))]);
        Ok(())
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert!(PathData::parse("").is_err());
        assert!(PathData::parse("10,20").is_err());
        assert!(PathData::parse("m 1,2 c 1,2 3,4").is_err());
        assert!(PathData::parse("c 1,1 2,2 3,3").is_err());
        assert!(PathData::parse("m 1,2 q 1,1 2,2").is_err());
    }
}
