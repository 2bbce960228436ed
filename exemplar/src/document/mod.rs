use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;

use interpreter::Namespace;
use tracing::{debug, trace};

use crate::error::Error;
use crate::evaluator::Evaluator;
use crate::evaluators::skip::SkipState;
use crate::example::Example;
use crate::parser::Parser;
use crate::region::Region;

/// Text encodings a document can be read with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    /// UTF-8 with an optional leading byte order mark, which is dropped.
    Utf8Sig,
    Latin1,
}

const BYTE_ORDER_MARK: &[u8] = b"\xEF\xBB\xBF";

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf8Sig => "utf-8-sig",
            Encoding::Latin1 => "latin-1",
        }
    }

    pub fn decode(self, bytes: &[u8], path: &Path) -> Result<String, Error> {
        let utf8 = |bytes: &[u8]| {
            String::from_utf8(bytes.to_vec())
                .map_err(|_| Error::Decode { path: path.to_path_buf(), encoding: self.name() })
        };
        match self {
            Encoding::Utf8 => utf8(bytes),
            Encoding::Utf8Sig => utf8(bytes.strip_prefix(BYTE_ORDER_MARK).unwrap_or(bytes)),
            Encoding::Latin1 => Ok(bytes.iter().map(|&byte| char::from(byte)).collect()),
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "utf-8-sig" | "utf8-sig" => Ok(Encoding::Utf8Sig),
            "latin-1" | "latin1" | "iso-8859-1" | "l1" => Ok(Encoding::Latin1),
            _ => Err(Error::UnknownEncoding(name.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The text of one source file together with the regions found in it.
///
/// Regions are kept sorted by start offset and never overlap. Examples are
/// evaluated in that order against a single namespace shared by the whole
/// document.
pub struct Document {
    text: String,
    path: PathBuf,
    regions: Vec<Region>,
    namespace: Namespace,
    /// Evaluators that temporarily replace each region's own.
    evaluators: RefCell<Vec<Rc<dyn Evaluator>>>,
    skip_state: RefCell<Option<SkipState>>,
}

impl Document {
    pub fn new(text: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Document {
            text: text.into(),
            path: path.into(),
            regions: Vec::new(),
            namespace: Namespace::new(),
            evaluators: RefCell::new(Vec::new()),
            skip_state: RefCell::new(None),
        }
    }

    /// Read `path` with `encoding` and add every region the parsers find.
    pub fn parse(
        path: impl AsRef<Path>,
        parsers: &[Box<dyn Parser>],
        encoding: Encoding,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        let text = encoding.decode(&bytes, path)?;
        Self::from_text(text, path, parsers)
    }

    pub fn from_text(
        text: impl Into<String>,
        path: impl Into<PathBuf>,
        parsers: &[Box<dyn Parser>],
    ) -> Result<Self, Error> {
        let mut document = Document::new(text, path);
        for parser in parsers {
            for region in parser.parse(&document)? {
                document.add(region)?;
            }
        }
        debug!(
            path = %document.path.display(),
            regions = document.regions.len(),
            "parsed document"
        );
        Ok(document)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Insert `region`, keeping regions sorted and rejecting any that would
    /// overlap a neighbour or fall outside the text.
    pub fn add(&mut self, region: Region) -> Result<(), Error> {
        if region.start > region.end {
            return Err(Error::value(format!("{} ends before it starts", self.describe(&region))));
        }
        if region.end > self.text.len() {
            return Err(Error::value(format!(
                "{} goes beyond end of document",
                self.describe(&region)
            )));
        }
        if !self.text.is_char_boundary(region.start) || !self.text.is_char_boundary(region.end) {
            return Err(Error::value(format!(
                "{} does not fall on character boundaries",
                self.describe(&region)
            )));
        }

        let index = self.regions.partition_point(|existing| existing.start <= region.start);
        let previous = index.checked_sub(1).map(|i| &self.regions[i]);
        if let Some(previous) = previous.filter(|previous| previous.end > region.start) {
            return Err(Error::value(format!(
                "{} overlaps {}",
                self.describe(previous),
                self.describe(&region)
            )));
        }
        if let Some(next) = self.regions.get(index).filter(|next| next.start < region.end) {
            return Err(Error::value(format!(
                "{} overlaps {}",
                self.describe(&region),
                self.describe(next)
            )));
        }

        trace!(start = region.start, end = region.end, evaluator = region.evaluator.name(), "adding region");
        self.regions.insert(index, region);
        Ok(())
    }

    fn describe(&self, region: &Region) -> String {
        let (start_line, start_column) = self.line_column(region.start);
        let (end_line, end_column) = self.line_column(region.end);
        format!(
            "{region:?} from line {start_line}, column {start_column} to line {end_line}, column {end_column}"
        )
    }

    /// 1-based line and column of a byte offset. Columns count characters.
    /// Offsets past the end of the text keep counting along the last line.
    pub fn line_column(&self, offset: usize) -> (usize, usize) {
        let bytes = self.text.as_bytes();
        let clamped = offset.min(bytes.len());
        let before = &bytes[..clamped];
        let line = 1 + before.iter().filter(|&&byte| byte == b'\n').count();
        let line_start = before.iter().rposition(|&byte| byte == b'\n').map_or(0, |i| i + 1);
        let column = char_count(&bytes[line_start..clamped]) + (offset - clamped) + 1;
        (line, column)
    }

    /// The examples of this document in order.
    pub fn examples(&self) -> Examples<'_> {
        Examples { document: self, index: 0, line: 1, place: 0, line_start: 0 }
    }

    /// The evaluator currently replacing each region's own, if any.
    pub fn evaluator(&self) -> Option<Rc<dyn Evaluator>> {
        self.evaluators.borrow().last().cloned()
    }

    pub fn push_evaluator(&self, evaluator: Rc<dyn Evaluator>) {
        debug!(evaluator = evaluator.name(), "pushing evaluator override");
        self.evaluators.borrow_mut().push(evaluator);
    }

    pub fn pop_evaluator(&self) -> Option<Rc<dyn Evaluator>> {
        let popped = self.evaluators.borrow_mut().pop();
        if let Some(evaluator) = &popped {
            debug!(evaluator = evaluator.name(), "popping evaluator override");
        }
        popped
    }

    pub(crate) fn skip_state(&self) -> &RefCell<Option<SkipState>> {
        &self.skip_state
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("path", &self.path)
            .field("regions", &self.regions)
            .finish_non_exhaustive()
    }
}

fn char_count(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&byte| byte & 0xC0 != 0x80).count()
}

/// Iterator over a document's examples, tracking line numbers as it goes so
/// each step only scans the text between consecutive regions.
pub struct Examples<'a> {
    document: &'a Document,
    index: usize,
    line: usize,
    place: usize,
    line_start: usize,
}

impl<'a> Iterator for Examples<'a> {
    type Item = Example<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let region = self.document.regions.get(self.index)?;
        self.index += 1;

        let bytes = self.document.text.as_bytes();
        let between = &bytes[self.place..region.start];
        self.line += between.iter().filter(|&&byte| byte == b'\n').count();
        if let Some(newline) = between.iter().rposition(|&byte| byte == b'\n') {
            self.line_start = self.place + newline + 1;
        }
        self.place = region.start;
        let column = char_count(&bytes[self.line_start..region.start]) + 1;

        Some(Example { document: self.document, line: self.line, column, region })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.document.regions.len() - self.index;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluator_fn;
    use pretty_assertions::assert_eq;

    fn region(start: usize, end: usize) -> Region {
        Region::new(start, end, (), evaluator_fn("check", |_| Ok(None)))
    }

    fn starts(document: &Document) -> Vec<(usize, usize)> {
        document.examples().map(|example| (example.start(), example.end())).collect()
    }

    #[test]
    fn adds_out_of_order_and_adjacent() {
        let mut document = Document::new("ABCDEFGH", "/the/path");
        document.add(region(2, 3)).unwrap();
        document.add(region(0, 1)).unwrap();
        document.add(region(1, 2)).unwrap();
        document.add(region(6, 8)).unwrap();
        assert_eq!(starts(&document), vec![(0, 1), (1, 2), (2, 3), (6, 8)]);
    }

    #[test]
    fn rejects_region_past_the_end() {
        let mut document = Document::new("ABCDEFGH", "/the/path");
        let error = document.add(region(8, 9)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "<Region start=8 end=9 check> from line 1, column 9 to line 1, column 10 \
             goes beyond end of document"
        );
    }

    #[test]
    fn rejects_overlap_with_previous() {
        let mut document = Document::new("ABCDEFGH", "/the/path");
        document.add(region(0, 2)).unwrap();
        let error = document.add(region(1, 3)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "<Region start=0 end=2 check> from line 1, column 1 to line 1, column 3 overlaps \
             <Region start=1 end=3 check> from line 1, column 2 to line 1, column 4"
        );
    }

    #[test]
    fn rejects_overlap_with_next() {
        let mut document = Document::new("ABCDEFGH", "/the/path");
        document.add(region(0, 1)).unwrap();
        document.add(region(2, 4)).unwrap();
        let error = document.add(region(1, 3)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "<Region start=1 end=3 check> from line 1, column 2 to line 1, column 4 overlaps \
             <Region start=2 end=4 check> from line 1, column 3 to line 1, column 5"
        );
    }

    #[test]
    fn rejected_regions_leave_the_document_unchanged() {
        let mut document = Document::new("ABCDEFGH", "/the/path");
        document.add(region(0, 2)).unwrap();
        document.add(region(4, 6)).unwrap();
        let bounds = |document: &Document| -> Vec<(usize, usize)> {
            document.regions().iter().map(|region| (region.start, region.end)).collect()
        };

        assert!(document.add(region(1, 3)).is_err());
        assert!(document.add(region(3, 5)).is_err());
        assert!(document.add(region(7, 9)).is_err());
        assert!(document.add(region(3, 2)).is_err());
        assert_eq!(bounds(&document), vec![(0, 2), (4, 6)]);

        document.add(region(2, 4)).unwrap();
        assert_eq!(bounds(&document), vec![(0, 2), (2, 4), (4, 6)]);
    }

    #[test]
    fn examples_carry_line_and_column() {
        let text = "R1XYZ\nR2XYZ\nR3XYZ\nR4XYZ\nR4XYZ\n";
        let at = |needle: &str| text.find(needle).unwrap();
        let mut document = Document::new(text, "");
        document.add(region(0, at("R2") + 2)).unwrap();
        document.add(region(at("R3") - 1, at("R3") + 2)).unwrap();
        document.add(region(at("R4") + 3, text.len())).unwrap();
        let positions: Vec<(usize, usize)> =
            document.examples().map(|example| (example.line, example.column)).collect();
        assert_eq!(positions, vec![(1, 1), (2, 6), (4, 4)]);
    }

    #[test]
    fn columns_count_characters() {
        let text = "héllo\nwörld x\n";
        let mut document = Document::new(text, "");
        let x = text.find('x').unwrap();
        document.add(region(x, x + 1)).unwrap();
        let example = document.examples().next().unwrap();
        assert_eq!((example.line, example.column), (2, 7));
        assert_eq!(document.line_column(x), (2, 7));
    }

    #[test]
    fn rejects_split_characters() {
        let mut document = Document::new("é", "");
        assert!(document.add(region(0, 1)).is_err());
    }

    #[test]
    fn encodings_decode() {
        let path = Path::new("doc.txt");
        assert_eq!(Encoding::Utf8Sig.decode(b"\xEF\xBB\xBFabc", path).unwrap(), "abc");
        assert_eq!(Encoding::Latin1.decode(b"caf\xE9", path).unwrap(), "café");
        assert!(matches!(
            Encoding::Utf8.decode(b"caf\xE9", path),
            Err(Error::Decode { encoding: "utf-8", .. })
        ));
        assert_eq!("UTF_8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert!("ebcdic".parse::<Encoding>().is_err());
    }

    #[test]
    fn evaluator_overrides_stack() {
        let document = Document::new("", "");
        assert!(document.evaluator().is_none());
        document.push_evaluator(evaluator_fn("outer", |_| Ok(None)));
        document.push_evaluator(evaluator_fn("inner", |_| Ok(None)));
        assert_eq!(document.evaluator().unwrap().name(), "inner");
        document.pop_evaluator();
        assert_eq!(document.evaluator().unwrap().name(), "outer");
        document.pop_evaluator();
        assert!(document.pop_evaluator().is_none());
    }
}
