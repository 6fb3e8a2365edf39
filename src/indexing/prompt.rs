//! 줄 단위 운영자 입력

use std::io::{BufRead, Write};

use super::reconcile::{IndexAction, IndexState, OperatorPrompt, Reconciliation};
use super::IndexError;

/// 입력/출력 스트림 기반 운영자 프롬프트
///
/// CLI에서는 stdin/stdout, 테스트에서는 메모리 버퍼를 씁니다.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> OperatorPrompt for LinePrompt<R, W> {
    fn choose(
        &mut self,
        state: IndexState,
        reconciliation: &Reconciliation,
    ) -> Result<IndexAction, IndexError> {
        match state {
            IndexState::NewFiles => {
                writeln!(self.output, "\n[*] 새 파일:")?;
                for f in &reconciliation.new {
                    writeln!(self.output, "    + {}", f)?;
                }
            }
            IndexState::FilesRemoved => {
                writeln!(self.output, "\n[!] 색인되었지만 폴더에 없는 파일:")?;
                for f in &reconciliation.removed {
                    writeln!(self.output, "    - {}", f)?;
                }
            }
            IndexState::UpToDate => {
                writeln!(self.output, "\n[OK] 모든 파일이 이미 색인되어 있습니다.")?;
            }
        }

        write!(self.output, "\n{}", state.prompt())?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            // 입력 종료 (Ctrl-D): 선택하지 않은 것으로 보고 변경 없음
            writeln!(self.output)?;
            return Ok(state.no_change());
        }

        Ok(state.parse_choice(&line))
    }
}

// ============================================================================
// Tests
// ============================================================================
