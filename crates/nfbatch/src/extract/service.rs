use std::sync::LazyLock;

use regex::Regex;

use crate::extract::schema::{StructuredInvoice, OVERFLOW_FIELD};
use crate::extract::StructuringError;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").unwrap());

/// Turns raw invoice text into the canonical field mapping.
///
/// One call covers exactly one invoice. Implementations must be callable from
/// several worker threads at once.
pub trait StructuredExtractor: Send + Sync {
    fn structure(
        &self,
        raw_text: &str,
        fields: &[&str],
    ) -> Result<StructuredInvoice, StructuringError>;
}

/// A worked example: one municipal layout and the mapping expected for it.
pub struct LayoutExample {
    pub layout: &'static str,
    pub text: &'static str,
    pub json: &'static str,
}

/// Layouts that differ the most in how labels and values are arranged.
pub const LAYOUT_EXAMPLES: [LayoutExample; 3] = [
    LayoutExample {
        layout: "Campinas, rótulo e valor na mesma linha",
        text: "PREFEITURA MUNICIPAL DE CAMPINAS
Data e hora de emissão 01/09/2025 16:32:17
EMITENTE PRESTADOR DO SERVIÇO
CPF/CNPJ/NIF 51.304.798/0001-04
Nome / Nome Empresarial UNIODONTO DE CAMPINAS COOPERATIVA ODONTOLOGICA
Endereço AVENIDA BRASIL 200 VL ITAPURA
Municipio CAMPINAS/SP
TOMADOR DO SERVIÇO
CPF/CNPJ/NIF 20.468.244/0001-00
Nome / Nome Empresarial DAFLA APOIO ADMINISTRATIVO LTDA
DESCRIÇÃO DO SERVIÇO PRESTADO
MENSALIDADE
Serviço 04.22-PLANOS DE MEDICINA DE GRUPO OU INDIVIDUAL
Valor total da NFSe Campinas (R$) 528,20
Base de cálculo do ISSQN (R$) 528,20
Aliq. (%) 5,000000
Valor do ISSQN (R$) 26,41",
        json: r#"{
  "prestador_cnpj": "51.304.798/0001-04",
  "prestador_razao_social": "UNIODONTO DE CAMPINAS COOPERATIVA ODONTOLOGICA",
  "prestador_municipio": "CAMPINAS",
  "prestador_uf": "SP",
  "tomador_cnpj": "20.468.244/0001-00",
  "tomador_razao_social": "DAFLA APOIO ADMINISTRATIVO LTDA",
  "numero_nf": null,
  "data_emissao": "01/09/2025",
  "codigo_servico": "04.22",
  "valor_total": "528,20",
  "base_calculo_iss": "528,20",
  "aliquota_iss": "5,000000",
  "valor_iss": "26,41",
  "discriminacao_servicos": "MENSALIDADE"
}"#,
    },
    LayoutExample {
        layout: "Mogi Guaçu, optante do Simples Nacional",
        text: "PREFEITURA MUNICIPAL DE MOGI GUAÇU
NOTA FISCAL ELETRÔNICA DE SERVIÇOS
Número da Nota - Série 000000004593 - E
Data de Emissão 29/09/2025
PRESTADOR DE SERVIÇOS
Nome/Razão Social: PROATIVA ASSESSORIA E CONSULTORIA TECNICA LTDA
CPF/CNPJ:18.023.902/0001-09
Endereço: RUA NUNES PEDROSA, 466 SALA 01, Mogi Guaçu - SP
TOMADOR DE SERVIÇOS
Nome/Razão Social: DAFLA APOIO ADMINISTRATIVO LTDA
CPF/CNPJ:20.468.244/0001-00
DISCRIMINAÇÃO DOS SERVIÇOS
PRESTAÇÃO DE SERVIÇO
Documento Emitido por Optante do Simples Nacional
Código do Serviço 1702-Datilografia, digitação...
Base de cálculo (R$) 2.454,40
Aliquota (%) 4,8712%
Vr do ISS (R$) 119,56
VALOR TOTAL DA NOTA = R$ 2.454,40",
        json: r#"{
  "prestador_cnpj": "18.023.902/0001-09",
  "prestador_razao_social": "PROATIVA ASSESSORIA E CONSULTORIA TECNICA LTDA",
  "prestador_municipio": "Mogi Guaçu",
  "prestador_uf": "SP",
  "tomador_cnpj": "20.468.244/0001-00",
  "tomador_razao_social": "DAFLA APOIO ADMINISTRATIVO LTDA",
  "numero_nf": "000000004593",
  "data_emissao": "29/09/2025",
  "codigo_servico": "1702",
  "valor_total": "2.454,40",
  "base_calculo_iss": "2.454,40",
  "aliquota_iss": "4,8712%",
  "valor_iss": "119,56",
  "discriminacao_servicos": "PRESTAÇÃO DE SERVIÇO",
  "observacoes_nf": "Documento Emitido por Optante do Simples Nacional"
}"#,
    },
    LayoutExample {
        layout: "Osasco, valores em tabela e texto de OCR",
        text: "Nota No.: 8226472
Emitido em: 17/09/2025
PRESTADOR DE SERVIÇOS
Razão Social/Nome: EBAZAR.COM.BR.LTDA
CNPJ/CPF: 03.007.331/0001-41
Município: Osasco UF: SP
TOMADOR DO SERVIÇO
Razão Social/Nome: CASA BRANCA ORGANICA LTDA
CNPJ/CPF: 45.791.858/0001-5
Cód. Serviço 10.02 Agenciamento, corretagem...
DESCRIÇÃO DOS SERVIÇOS E OUTRAS INFORMAÇÕES:
Intermediação de negócios
Valor Serviço Base de Cálculo Aliq. (%): Valor ISS
1.233,38 1.233,38 2,00 24,67
IR (R$): Cofins (R$): CSLL (R$): Valor Total da Nota
INSS (RS): Pis/Pasep (R$): Outros (R$): 1.233,38",
        json: r#"{
  "prestador_cnpj": "03.007.331/0001-41",
  "prestador_razao_social": "EBAZAR.COM.BR.LTDA",
  "prestador_municipio": "Osasco",
  "prestador_uf": "SP",
  "tomador_cnpj": "45.791.858/0001-5",
  "tomador_razao_social": "CASA BRANCA ORGANICA LTDA",
  "numero_nf": "8226472",
  "data_emissao": "17/09/2025",
  "codigo_servico": "10.02",
  "valor_total": "1.233,38",
  "base_calculo_iss": "1.233,38",
  "aliquota_iss": "2,00",
  "valor_iss": "24,67",
  "valor_pis": null,
  "valor_cofins": null,
  "valor_csll": null,
  "discriminacao_servicos": "Intermediação de negócios"
}"#,
    },
];

/// Instructions sent with every request: the field list, the extraction
/// rules and the worked [`LAYOUT_EXAMPLES`].
pub fn system_prompt(fields: &[&str]) -> String {
    let field_list = fields
        .iter()
        .map(|f| format!("- {}", f))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "Você extrai dados de Notas Fiscais de Serviços Eletrônicas (NFS-e) brasileiras.\n\
         O texto recebido corresponde a UMA única nota fiscal e pode conter ruído de OCR.\n\
         Responda somente com um objeto JSON contendo exatamente estas chaves:\n\
         {fields}\n\
         - {overflow}: lista de objetos {{\"chave\": ..., \"valor\": ...}} com os demais \
         campos rotulados que não se encaixam nas chaves acima.\n\n\
         Regras:\n\
         1. Copie os valores literalmente como aparecem no documento (números, pontuação, \
         vírgulas decimais). Não converta nem recalcule.\n\
         2. Use null para qualquer campo que não esteja no documento.\n\
         3. Em discriminacao_servicos, descreva o serviço sem repetir valores monetários.\n\
         4. CNPJs do prestador e do tomador não podem ser confundidos; siga os rótulos do \
         documento.\n\
         5. Ignore caracteres corrompidos pelo OCR quando o rótulo estiver legível. Um rótulo \
         e seu valor podem estar em linhas diferentes.\n\
         6. Use os exemplos abaixo como guia para mapear layouts diferentes. Campos omitidos \
         nos exemplos seguem a regra 2.",
        fields = field_list,
        overflow = OVERFLOW_FIELD,
    );

    for (index, example) in LAYOUT_EXAMPLES.iter().enumerate() {
        let number = index + 1;
        prompt.push_str(&format!(
            "\n\n--- EXEMPLO {number} ({layout}) ---\n\
             [TEXTO]\n{text}\n[FIM DO TEXTO]\n\
             [JSON]\n{json}\n[FIM DO JSON]",
            layout = example.layout,
            text = example.text,
            json = example.json,
        ));
    }

    prompt
}

/// Parses a service reply into an invoice. A fenced code block, if present,
/// is unwrapped first.
pub fn parse_reply(content: &str) -> Result<StructuredInvoice, StructuringError> {
    let body = FENCED_BLOCK
        .captures(content)
        .and_then(|c| c.get(1))
        .map_or(content, |m| m.as_str())
        .trim();

    if body.is_empty() {
        return Err(StructuringError::ResponseParsing(
            "empty response content".to_string(),
        ));
    }

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;
    StructuredInvoice::from_json(value)
}
