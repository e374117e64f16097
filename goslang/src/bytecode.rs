use std::fmt;

use crate::{Native, PrimitiveType};

/// (frame, slot) pair resolved at compile time. Frames count from the
/// outermost (predeclared) frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LexicalAddress {
    pub frame: usize,
    pub slot: usize,
}

impl LexicalAddress {
    pub const fn new(frame: usize, slot: usize) -> Self {
        Self { frame, slot }
    }
}

impl fmt::Display for LexicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.frame, self.slot)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
    Complement,
}

impl UnaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+u" => UnaryOperator::Plus,
            "-u" => UnaryOperator::Minus,
            "!u" => UnaryOperator::Not,
            "^u" => UnaryOperator::Complement,
            _ => return None,
        };
        Some(op)
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::Complement => "^",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    BitOr,
    BitXor,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    AndNot,
}

impl BinaryOperator {
    pub const ALL: [BinaryOperator; 19] = [
        BinaryOperator::And,
        BinaryOperator::Or,
        BinaryOperator::Eq,
        BinaryOperator::Ne,
        BinaryOperator::Lt,
        BinaryOperator::Gt,
        BinaryOperator::Le,
        BinaryOperator::Ge,
        BinaryOperator::Add,
        BinaryOperator::Sub,
        BinaryOperator::BitOr,
        BinaryOperator::BitXor,
        BinaryOperator::Mul,
        BinaryOperator::Div,
        BinaryOperator::Rem,
        BinaryOperator::Shl,
        BinaryOperator::Shr,
        BinaryOperator::BitAnd,
        BinaryOperator::AndNot,
    ];

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::AndNot => "&^",
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Lt
                | BinaryOperator::Gt
                | BinaryOperator::Le
                | BinaryOperator::Ge
        )
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    LoadConstant { value: Native, ty: PrimitiveType },
    /// the "no value" marker a body falls through with
    LoadNil,
    Load { address: LexicalAddress },
    Assign { address: LexicalAddress },
    UnaryOp { op: UnaryOperator },
    BinaryOp { op: BinaryOperator },
    JumpIfFalse { target: usize },
    Goto { target: usize },
    EnterScope { slots: usize },
    ExitScope,
    MakeClosure { arity_in: u8, arity_out: u8, entry: u16 },
    Call { arity: usize },
    TailCall { arity: usize },
    GoCall { arity: usize },
    Reset,
    Done,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::LoadConstant { value, ty } => write!(f, "LDC {value} {ty}"),
            Instruction::LoadNil => f.write_str("LDNIL"),
            Instruction::Load { address } => write!(f, "LD {address}"),
            Instruction::Assign { address } => write!(f, "ASSIGN {address}"),
            Instruction::UnaryOp { op } => write!(f, "UNOP {}", op.symbol()),
            Instruction::BinaryOp { op } => write!(f, "BINOP {}", op.symbol()),
            Instruction::JumpIfFalse { target } => write!(f, "JOF {target}"),
            Instruction::Goto { target } => write!(f, "GOTO {target}"),
            Instruction::EnterScope { slots } => write!(f, "ENTER_SCOPE {slots}"),
            Instruction::ExitScope => f.write_str("EXIT_SCOPE"),
            Instruction::MakeClosure {
                arity_in,
                arity_out,
                entry,
            } => write!(f, "LDF {arity_in} {arity_out} {entry}"),
            Instruction::Call { arity } => write!(f, "CALL {arity}"),
            Instruction::TailCall { arity } => write!(f, "TAIL_CALL {arity}"),
            Instruction::GoCall { arity } => write!(f, "GO_CALL {arity}"),
            Instruction::Reset => f.write_str("RESET"),
            Instruction::Done => f.write_str("DONE"),
        }
    }
}

/// A compiled program. Instructions are addressed by index and never change
/// after compilation; every execution unit shares one `Program`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }

    /// Index of the terminating `Done`, the return target of goroutines.
    pub fn exit_pc(&self) -> usize {
        self.instructions.len().saturating_sub(1)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pc, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "{pc:>5}  {instruction}")?;
        }
        Ok(())
    }
}
