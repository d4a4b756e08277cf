//! Remapping of generic signature attributes (JVMS §4.7.9.1).
//!
//! Class, method, and field signatures share one grammar; the entry point
//! detects which production applies. Only class names inside
//! `ClassTypeSignature` tokens are rewritten; everything else is copied.

use lumen_classfile::{Error as ClassfileError, Result as ClassfileResult};

use crate::remapper::Remapper;

pub(crate) fn remap_signature(remapper: &Remapper, sig: &str) -> ClassfileResult<String> {
    let mut writer = Writer {
        remapper,
        sig,
        pos: 0,
        out: String::with_capacity(sig.len()),
    };
    writer.signature()?;
    if writer.pos != sig.len() {
        return Err(writer.invalid());
    }
    Ok(writer.out)
}

struct Writer<'a> {
    remapper: &'a Remapper<'a>,
    sig: &'a str,
    pos: usize,
    out: String,
}

impl<'a> Writer<'a> {
    fn invalid(&self) -> ClassfileError {
        ClassfileError::InvalidDescriptor(self.sig.to_string())
    }

    fn peek(&self) -> Option<u8> {
        self.sig.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> ClassfileResult<u8> {
        let b = self.peek().ok_or_else(|| self.invalid())?;
        self.pos += 1;
        Ok(b)
    }

    fn expect(&mut self, byte: u8) -> ClassfileResult<()> {
        if self.bump()? != byte {
            return Err(self.invalid());
        }
        Ok(())
    }

    /// Copies input up to (not including) the first occurrence of any stop
    /// byte, returning the copied slice.
    fn take_until(&mut self, stops: &[u8]) -> ClassfileResult<&'a str> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if stops.contains(&b) {
                return Ok(&self.sig[start..self.pos]);
            }
            self.pos += 1;
        }
        Err(self.invalid())
    }

    fn signature(&mut self) -> ClassfileResult<()> {
        if self.peek() == Some(b'<') {
            self.type_params()?;
        }
        if self.peek() == Some(b'(') {
            return self.method_tail();
        }
        // Class signature (superclass + interfaces) or field signature.
        self.reference_type()?;
        while self.peek().is_some() {
            self.reference_type()?;
        }
        Ok(())
    }

    fn type_params(&mut self) -> ClassfileResult<()> {
        self.expect(b'<')?;
        self.out.push('<');
        while self.peek() != Some(b'>') {
            let name = self.take_until(&[b':'])?;
            self.out.push_str(name);
            self.expect(b':')?;
            self.out.push(':');
            // The class bound may be empty.
            if !matches!(self.peek(), Some(b':') | Some(b'>')) {
                self.reference_type()?;
            }
            while self.peek() == Some(b':') {
                self.bump()?;
                self.out.push(':');
                self.reference_type()?;
            }
        }
        self.bump()?;
        self.out.push('>');
        Ok(())
    }

    fn method_tail(&mut self) -> ClassfileResult<()> {
        self.expect(b'(')?;
        self.out.push('(');
        while self.peek() != Some(b')') {
            self.java_type()?;
        }
        self.bump()?;
        self.out.push(')');
        if self.peek() == Some(b'V') {
            self.bump()?;
            self.out.push('V');
        } else {
            self.java_type()?;
        }
        while self.peek() == Some(b'^') {
            self.bump()?;
            self.out.push('^');
            self.reference_type()?;
        }
        Ok(())
    }

    fn java_type(&mut self) -> ClassfileResult<()> {
        match self.peek() {
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => {
                let b = self.bump()?;
                self.out.push(b as char);
                Ok(())
            }
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> ClassfileResult<()> {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                let var = self.take_until(&[b';'])?;
                self.out.push_str(var);
                self.bump()?;
                self.out.push(';');
                Ok(())
            }
            Some(b'[') => {
                self.bump()?;
                self.out.push('[');
                self.java_type()
            }
            _ => Err(self.invalid()),
        }
    }

    fn class_type(&mut self) -> ClassfileResult<()> {
        self.expect(b'L')?;
        self.out.push('L');
        let base = self.take_until(&[b'<', b';', b'.'])?;
        let mut full = base.to_string();
        let mut mapped = self.remapper.map_class(&full);
        self.out.push_str(&mapped);
        if self.peek() == Some(b'<') {
            self.type_args()?;
        }
        while self.peek() == Some(b'.') {
            self.bump()?;
            self.out.push('.');
            let inner = self.take_until(&[b'<', b';', b'.'])?;
            full = format!("{full}${inner}");
            let mapped_full = self.remapper.map_class(&full);
            // The inner segment is whatever the mapped full name adds over
            // the mapped outer name.
            let prefix = format!("{mapped}$");
            let segment = match mapped_full.strip_prefix(&prefix) {
                Some(segment) => segment.to_string(),
                None => match mapped_full.rfind('$') {
                    Some(split) => mapped_full[split + 1..].to_string(),
                    None => mapped_full.clone(),
                },
            };
            self.out.push_str(&segment);
            mapped = mapped_full;
            if self.peek() == Some(b'<') {
                self.type_args()?;
            }
        }
        self.expect(b';')?;
        self.out.push(';');
        Ok(())
    }

    fn type_args(&mut self) -> ClassfileResult<()> {
        self.expect(b'<')?;
        self.out.push('<');
        while self.peek() != Some(b'>') {
            match self.peek() {
                Some(b'*') => {
                    self.bump()?;
                    self.out.push('*');
                }
                Some(b'+') | Some(b'-') => {
                    let b = self.bump()?;
                    self.out.push(b as char);
                    self.reference_type()?;
                }
                _ => self.reference_type()?,
            }
        }
        self.bump()?;
        self.out.push('>');
        Ok(())
    }
}
