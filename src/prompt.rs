// Audiobook Master - Audible/ACX submission preparation
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Interactive console prompts
//!
//! Generic over the reader and writer so the flow can be driven from tests.
//! End of input is reported as `Interrupted`.

use crate::audio::metadata::MetadataProfile;
use crate::error::{MasteringError, Result};
use crate::file::Discovery;
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `prompt`, read one trimmed line
    pub fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(MasteringError::Interrupted);
        }
        Ok(line.trim().to_string())
    }

    pub fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }

    /// Directory path with surrounding quotes removed (drag-and-drop paths)
    pub fn ask_directory(&mut self) -> Result<PathBuf> {
        let answer = self.ask("Enter the full path to your audiobook files directory: ")?;
        let unquoted = answer
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| answer.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
            .unwrap_or(answer.as_str());
        Ok(PathBuf::from(unquoted))
    }

    pub fn report_discovery(&mut self, discovery: &Discovery) -> Result<()> {
        writeln!(
            self.output,
            "\nFound {} MP3 files and {} WAV files in the directory.",
            discovery.mp3_count, discovery.wav_count
        )?;
        writeln!(self.output, "Total: {} audio files", discovery.len())?;
        if discovery.wav_count > 0 {
            writeln!(
                self.output,
                "WAV files will be converted to MP3 format with Audible's required settings."
            )?;
        }
        Ok(())
    }

    /// Ask for every profile field; blank answers leave the field unset
    pub fn collect_metadata(&mut self) -> Result<MetadataProfile> {
        writeln!(self.output, "\n=== Metadata Collection ===")?;
        writeln!(
            self.output,
            "For each field, enter the value or press Enter to leave it blank.\n"
        )?;

        let mut profile = MetadataProfile::default();
        let fields: [(&str, &mut Option<String>); 9] = [
            ("Artist (Author Name): ", &mut profile.author),
            ("Album Title (Book Title): ", &mut profile.book_title),
            ("Year (Production/Copyright Year): ", &mut profile.year),
            ("Copyright Year: ", &mut profile.copyright),
            ("Genre: ", &mut profile.genre),
            ("Album Artist (Narrator Name): ", &mut profile.narrator),
            ("Producer (Production Company): ", &mut profile.producer),
            ("Composer (Audio Technician): ", &mut profile.audio_technician),
            ("Comments (Narrator and Publisher): ", &mut profile.comment),
        ];

        for (prompt, field) in fields {
            let answer = self.ask(prompt)?;
            if !answer.is_empty() {
                *field = Some(answer);
            }
        }

        writeln!(self.output, "\nMetadata collection completed.")?;
        Ok(profile)
    }

    /// Yes when the answer starts with `y` or `Y`
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.ask(&format!("{} (y/n): ", question))?;
        Ok(answer.to_lowercase().starts_with('y'))
    }

    /// Numbered file menu; `Some(index)` for a valid choice, `None` to skip
    pub fn choose_file(&mut self, files: &[PathBuf]) -> Result<Option<usize>> {
        writeln!(self.output, "\nAvailable files:")?;
        for (i, file) in files.iter().enumerate() {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            writeln!(self.output, "{}. {}", i + 1, name)?;
        }

        let answer = self.ask("\nEnter the number of the file to visualize (0 to skip): ")?;
        match answer.parse::<usize>() {
            Ok(0) => Ok(None),
            Ok(n) if n <= files.len() => Ok(Some(n - 1)),
            _ => {
                writeln!(self.output, "Invalid choice. Skipping visualization.")?;
                Ok(None)
            }
        }
    }
}
